//! 资质与岗位派生事实

use serde_json::Value;

use super::coerce::{days_between, scalar_text, to_datetime};
use super::{FactPath, FactResolver, Resolution, entity, field, ids_contain};
use crate::error::FactError;
use crate::models::EvalContext;

/// 处理 `competency.IsRequired`、`competency.DaysUntilExpiry` 与 `competency.Expired`
pub struct CompetencyResolver;

impl CompetencyResolver {
    fn competency_id(competency: Option<&Value>) -> Option<String> {
        field(competency, "CompetencyID")
            .or_else(|| field(competency, "ID"))
            .and_then(scalar_text)
    }

    fn is_required(ctx: &EvalContext, competency: Option<&Value>) -> bool {
        let Some(id) = Self::competency_id(competency) else {
            return false;
        };
        ids_contain(entity(ctx, "requiredCompetencyIds"), &id)
            || ids_contain(
                field(entity(ctx, "jobPosition"), "RequiredCompetencyIDs"),
                &id,
            )
    }
}

impl FactResolver for CompetencyResolver {
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        if path.segments().len() != 2 || !path.root().eq_ignore_ascii_case("competency") {
            return Ok(Resolution::Unhandled);
        }

        let competency = entity(ctx, "competency");
        let expiry = field(competency, "ExpiryDate").and_then(to_datetime);

        let resolution = match path.leaf().to_ascii_lowercase().as_str() {
            "isrequired" => Resolution::from(Self::is_required(ctx, competency)),
            "daysuntilexpiry" => Resolution::from(
                expiry
                    .map(|expiry| days_between(ctx.now, expiry))
                    .unwrap_or(0),
            ),
            "expired" => Resolution::from(expiry.is_some_and(|expiry| expiry < ctx.now)),
            _ => Resolution::Unhandled,
        };

        Ok(resolution)
    }
}

/// 处理 `jobPosition.RequiresCompetency[id]`
pub struct JobPositionResolver;

impl FactResolver for JobPositionResolver {
    fn resolve(&self, ctx: &EvalContext, path: &FactPath<'_>) -> Result<Resolution, FactError> {
        if !path.is("jobPosition", "RequiresCompetency") {
            return Ok(Resolution::Unhandled);
        }

        let id = path.require_argument()?;
        let position = entity(ctx, "jobPosition");
        Ok(Resolution::from(ids_contain(
            field(position, "RequiredCompetencyIDs"),
            id,
        )))
    }
}
