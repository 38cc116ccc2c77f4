//! Local time tool — reads the clock in the configured fixed UTC offset.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use oracle_core::error::ToolError;
use oracle_core::tool::{Capability, Tool, ToolOutput};

pub struct LocalTimeTool {
    offset: FixedOffset,
    label: String,
    /// Pinned instant, used instead of the system clock when set.
    fixed: Option<DateTime<Utc>>,
}

impl LocalTimeTool {
    /// A clock `offset_minutes` east of UTC. Out-of-range offsets fall back to UTC.
    pub fn new(offset_minutes: i32, label: impl Into<String>) -> Self {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { offset, label: label.into(), fixed: None }
    }

    /// Always report `instant` instead of reading the system clock.
    pub fn fixed(mut self, instant: DateTime<Utc>) -> Self {
        self.fixed = Some(instant);
        self
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.fixed.unwrap_or_else(Utc::now).with_timezone(&self.offset)
    }
}

/// Render a local time the way the agent speaks it.
pub fn format_local_time(now: &DateTime<FixedOffset>) -> String {
    now.format("Today is %A, %d %B %Y and the time is %I:%M %p.").to_string()
}

#[async_trait]
impl Tool for LocalTimeTool {
    fn name(&self) -> &str {
        "get_local_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time. Always call this for any question about the time or date; never guess."
    }

    fn capability(&self) -> Capability {
        Capability::Time
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let now = self.now();
        Ok(ToolOutput {
            output: format_local_time(&now),
            data: Some(serde_json::json!({
                "iso": now.to_rfc3339(),
                "timezone": self.label,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn reports_ist_time() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 14, 9, 15, 0).unwrap();
        let tool = LocalTimeTool::new(330, "IST").fixed(instant);
        let out = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(out.output, "Today is Saturday, 14 March 2026 and the time is 02:45 PM.");
        assert_eq!(out.data.unwrap()["timezone"], "IST");
    }

    #[test]
    fn invalid_offset_falls_back_to_utc() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let tool = LocalTimeTool::new(100_000, "UTC").fixed(instant);
        assert_eq!(tool.now().offset().local_minus_utc(), 0);
    }

    #[test]
    fn overflowing_offset_falls_back_to_utc() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for minutes in [40_000_000, i32::MIN] {
            let tool = LocalTimeTool::new(minutes, "UTC").fixed(instant);
            assert_eq!(tool.now().offset().local_minus_utc(), 0);
        }
    }

    #[test]
    fn declares_time_capability() {
        let spec = LocalTimeTool::new(330, "IST").spec();
        assert_eq!(spec.name, "get_local_time");
        assert_eq!(spec.capability, Capability::Time);
    }
}
