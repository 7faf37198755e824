//! Confirmation gate for destructive actions.
//!
//! [`ConfirmAction`] wraps an executor and adds the [`Confirmable`]
//! capability. Its plain `execute` refuses to run. [`run`] is the entry point
//! front ends use to execute a leaf: it probes for the capability, asks a
//! [`Prompter`] and only runs the inner executor on an explicit yes.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Error;
use crate::node::{Confirmable, Descriptor, Executor};
use crate::value::{display_value, Schema};

/// Executor wrapper that requires confirmation before running.
pub struct ConfirmAction {
    inner: Arc<dyn Executor>,
    template: String,
}

impl ConfirmAction {
    /// `template` may reference parameters and configs as `{name}`.
    pub fn new(inner: Arc<dyn Executor>, template: impl Into<String>) -> Self {
        Self {
            inner,
            template: template.into(),
        }
    }

    pub fn inner(&self) -> &Arc<dyn Executor> {
        &self.inner
    }
}

impl Descriptor for ConfirmAction {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> &str {
        self.inner.version()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

impl Executor for ConfirmAction {
    fn parameter_schema(&self) -> &Schema {
        self.inner.parameter_schema()
    }

    fn config_schema(&self) -> &Schema {
        self.inner.config_schema()
    }

    fn execute(&self, _parameters: &Value, _configs: &Value) -> Result<Value, Error> {
        Err(Error::ConfirmationRequired {
            action: self.name().to_owned(),
        })
    }

    fn as_confirmable(&self) -> Option<&dyn Confirmable> {
        Some(self)
    }

    fn prepare(&self) {
        self.inner.prepare();
    }
}

impl Confirmable for ConfirmAction {
    fn confirm_prompt(&self, parameters: &Value, configs: &Value) -> Result<String, Error> {
        let parameters = self.inner.parameter_schema().convert(parameters)?;
        let configs = self.inner.config_schema().convert(configs)?;
        Ok(render_template(&self.template, &parameters, &configs))
    }

    fn execute_confirmed(&self, parameters: &Value, configs: &Value) -> Result<Value, Error> {
        self.inner.execute(parameters, configs)
    }
}

/// Replace `{name}` placeholders with parameter values, then config values.
/// Unknown placeholders are left as written.
pub fn render_template(
    template: &str,
    parameters: &Map<String, Value>,
    configs: &Map<String, Value>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match parameters.get(key).or_else(|| configs.get(key)) {
            Some(value) => out.push_str(&display_value(value)),
            None => out.push_str(&rest[start..start + end + 2]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Source of a yes/no answer to a confirmation message.
pub trait Prompter {
    /// `true` only on explicit affirmative input.
    fn confirm(&self, message: &str) -> Result<bool, Error>;
}

/// Interactive terminal prompt. Anything other than an explicit yes,
/// including a non-interactive terminal, declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> Result<bool, Error> {
        match dialoguer::Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact_opt()
        {
            Ok(answer) => Ok(answer.unwrap_or(false)),
            Err(e) => {
                warn!(error = %e, "confirmation prompt unavailable, declining");
                Ok(false)
            }
        }
    }
}

/// Prompter for non-interactive use: always declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct Decline;

impl Prompter for Decline {
    fn confirm(&self, _message: &str) -> Result<bool, Error> {
        Ok(false)
    }
}

/// Result of [`run`].
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Completed(Value),
    /// Confirmation was required and not given; nothing ran.
    Declined,
}

/// Execute `executor`, asking `prompter` first if it is confirmable.
/// `assume_yes` skips the question.
pub fn run(
    executor: &dyn Executor,
    parameters: &Value,
    configs: &Value,
    prompter: &dyn Prompter,
    assume_yes: bool,
) -> Result<Execution, Error> {
    let Some(confirmable) = executor.as_confirmable() else {
        return executor
            .execute(parameters, configs)
            .map(Execution::Completed);
    };

    let message = confirmable.confirm_prompt(parameters, configs)?;
    if assume_yes {
        debug!(action = executor.name(), "confirmation skipped");
    } else if !prompter.confirm(&message)? {
        debug!(action = executor.name(), "confirmation declined");
        return Ok(Execution::Declined);
    }
    confirmable
        .execute_confirmed(parameters, configs)
        .map(Execution::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::testing::StubAction;
    use serde_json::json;
    use std::cell::RefCell;

    /// Answers with a fixed value and remembers what it was asked.
    struct Scripted {
        answer: bool,
        asked: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompter for Scripted {
        fn confirm(&self, message: &str) -> Result<bool, Error> {
            self.asked.borrow_mut().push(message.to_owned());
            Ok(self.answer)
        }
    }

    fn guarded() -> (ConfirmAction, Arc<StubAction>) {
        let stub = Arc::new(StubAction::new("delete-id"));
        let inner: Arc<dyn Executor> = stub.clone();
        let action = ConfirmAction::new(inner, "Delete instance {id} in {region}?");
        (action, stub)
    }

    #[test]
    fn confirm_action_advertises_capability() {
        let (action, _) = guarded();
        assert!(action.as_confirmable().is_some());
        assert_eq!(action.name(), "delete-id");
    }

    #[test]
    fn confirm_prompt_substitutes_converted_values() {
        let (action, stub) = guarded();
        let message = action
            .confirm_prompt(&json!({"id": 7}), &json!({"region": "eu-1"}))
            .unwrap();
        assert_eq!(message, "Delete instance 7 in eu-1?");
        assert_eq!(stub.calls(), 0, "rendering the prompt must not execute");
    }

    #[test]
    fn confirm_prompt_rejects_invalid_parameters() {
        let (action, _) = guarded();
        assert!(action
            .confirm_prompt(&json!({"bogus": 1}), &Value::Null)
            .is_err());
    }

    #[test]
    fn execute_without_confirmation_is_refused() {
        let (action, stub) = guarded();
        let err = action
            .execute(&json!({"id": "i-1"}), &json!({"region": "us"}))
            .unwrap_err();
        assert!(matches!(err, Error::ConfirmationRequired { ref action } if action == "delete-id"));
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn run_declines_without_affirmative_answer() {
        let (action, stub) = guarded();
        let result = run(&action, &json!({"id": "i-1"}), &Value::Null, &Decline, false).unwrap();
        assert_eq!(result, Execution::Declined);
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn run_executes_after_yes() {
        let (action, stub) = guarded();
        let prompter = Scripted::new(true);
        let result = run(
            &action,
            &json!({"id": "i-1"}),
            &json!({"region": "us"}),
            &prompter,
            false,
        )
        .unwrap();
        assert!(matches!(result, Execution::Completed(ref v) if v["parameters"]["id"] == "i-1"));
        assert_eq!(stub.calls(), 1);
        assert_eq!(*prompter.asked.borrow(), ["Delete instance i-1 in us?"]);
    }

    #[test]
    fn run_with_assume_yes_skips_prompt() {
        let (action, stub) = guarded();
        let prompter = Scripted::new(false);
        run(&action, &json!({"id": "i-1"}), &Value::Null, &prompter, true).unwrap();
        assert_eq!(stub.calls(), 1);
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn run_does_not_prompt_for_plain_executors() {
        let stub = StubAction::new("get");
        let prompter = Scripted::new(false);
        let result = run(&stub, &Value::Null, &Value::Null, &prompter, false).unwrap();
        assert!(matches!(result, Execution::Completed(_)));
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn render_template_leaves_unknown_and_unclosed_placeholders() {
        let mut params = Map::new();
        params.insert("id".into(), json!("x"));
        assert_eq!(
            render_template("{id} {missing} {open", &params, &Map::new()),
            "x {missing} {open"
        );
    }
}
