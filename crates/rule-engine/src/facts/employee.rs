//! 员工派生事实

use super::coerce::{days_between, scalar_text, to_datetime};
use super::{FactPath, FactResolver, Resolution, entity, field, ids_contain};
use crate::error::FactError;
use crate::models::EvalContext;

/// 处理 `employee.Active`、`employee.DaysSinceHire` 与 `employee.HasCompetency[id]`
pub struct EmployeeResolver;

impl FactResolver for EmployeeResolver {
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        if path.segments().len() != 2 || !path.root().eq_ignore_ascii_case("employee") {
            return Ok(Resolution::Unhandled);
        }

        let employee = entity(ctx, "employee");

        let resolution = match path.leaf().to_ascii_lowercase().as_str() {
            "active" => {
                let active = field(employee, "EmployeeStatus")
                    .and_then(scalar_text)
                    .is_some_and(|status| status.trim().eq_ignore_ascii_case("active"));
                Resolution::from(active)
            }
            "dayssincehire" => {
                let days = field(employee, "HireDate")
                    .and_then(to_datetime)
                    .map(|hired| days_between(hired, ctx.now))
                    .unwrap_or(0);
                Resolution::from(days)
            }
            "hascompetency" => {
                let id = path.require_argument()?;
                let held = ids_contain(field(employee, "Competencies"), id)
                    || ids_contain(entity(ctx, "employeeCompetencies"), id);
                Resolution::from(held)
            }
            _ => Resolution::Unhandled,
        };

        Ok(resolution)
    }
}
