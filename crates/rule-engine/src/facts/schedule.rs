//! 排班事件派生事实

use super::coerce::{days_between, to_datetime};
use super::{FactPath, FactResolver, Resolution, entity, field};
use crate::error::FactError;
use crate::models::EvalContext;

/// 处理 `scheduledEvent.DaysUntilStart`、`scheduledEvent.DurationHours` 与 `scheduledEvent.InProgress`
pub struct ScheduledEventResolver;

impl FactResolver for ScheduledEventResolver {
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        if path.segments().len() != 2 || !path.root().eq_ignore_ascii_case("scheduledEvent") {
            return Ok(Resolution::Unhandled);
        }

        let event = entity(ctx, "scheduledEvent");
        let start = field(event, "StartTime").and_then(to_datetime);
        let end = field(event, "EndTime").and_then(to_datetime);

        let resolution = match path.leaf().to_ascii_lowercase().as_str() {
            "daysuntilstart" => {
                Resolution::from(start.map(|start| days_between(ctx.now, start)).unwrap_or(0))
            }
            "durationhours" => {
                let hours = match (start, end) {
                    (Some(start), Some(end)) => (end - start).num_seconds() as f64 / 3600.0,
                    _ => 0.0,
                };
                Resolution::from(hours)
            }
            "inprogress" => {
                let running = match (start, end) {
                    (Some(start), Some(end)) => start <= ctx.now && ctx.now < end,
                    _ => false,
                };
                Resolution::from(running)
            }
            _ => Resolution::Unhandled,
        };

        Ok(resolution)
    }
}
