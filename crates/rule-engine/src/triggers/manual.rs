use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{ContextSink, TriggerHandler, trigger_context};
use crate::error::{EngineError, Result};
use crate::models::Parameters;

/// `manual` 触发器：以 `payload` 参数为数据产生一个上下文
pub struct ManualTrigger;

#[async_trait]
impl TriggerHandler for ManualTrigger {
    async fn fire(&self, params: &Parameters, sink: &mut dyn ContextSink) -> Result<()> {
        let mut ctx = trigger_context(Utc::now(), "manual", "manual", None);

        match params.get("payload") {
            None | Some(Value::Null) => {}
            Some(Value::Object(payload)) => {
                for (key, value) in payload {
                    // 触发器元数据不允许被载荷覆盖
                    if !key.eq_ignore_ascii_case("trigger") {
                        ctx.insert(key.clone(), value.clone());
                    }
                }
            }
            Some(_) => {
                return Err(EngineError::Trigger {
                    trigger_type: "manual".to_string(),
                    message: "payload 必须是对象".to_string(),
                });
            }
        }

        sink.emit(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::CollectingSink;
    use serde_json::json;

    #[tokio::test]
    async fn test_manual_emits_payload() {
        let params = json!({ "payload": { "employee": { "EmployeeID": 7 } } });
        let mut sink = CollectingSink::default();

        ManualTrigger
            .fire(params.as_object().unwrap(), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.contexts.len(), 1);
        let ctx = &sink.contexts[0];
        assert_eq!(ctx.lookup("employee.EmployeeID"), Some(&json!(7)));
        assert_eq!(ctx.lookup("trigger.type"), Some(&json!("manual")));
    }

    #[tokio::test]
    async fn test_manual_without_payload() {
        let mut sink = CollectingSink::default();
        ManualTrigger.fire(&Parameters::new(), &mut sink).await.unwrap();
        assert_eq!(sink.contexts.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_rejects_scalar_payload() {
        let params = json!({ "payload": 5 });
        let mut sink = CollectingSink::default();
        let err = ManualTrigger
            .fire(params.as_object().unwrap(), &mut sink)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TRIGGER_ERROR");
        assert!(sink.contexts.is_empty());
    }
}
