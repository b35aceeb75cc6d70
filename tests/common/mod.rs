use std::sync::{Arc, Mutex};

use naab::{
    exec::Executor,
    runtime::{error::RuntimeError, value::Value, value::ValueRef},
};

/// Backend stand-in for integration tests: logs every fragment it runs and
/// returns the fragment parsed as an integer (or the fragment itself as a
/// string). A fragment of the form `sleep:<ms>` sleeps that long before
/// returning the millisecond count, for exercising deadlines.
pub struct ScriptedExecutor {
    pub language: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new(language: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            ScriptedExecutor {
                language,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&mut self, code: &str) -> Result<(), RuntimeError> {
        self.log.lock().unwrap().push(code.to_string());
        Ok(())
    }

    fn evaluate_with_return(&mut self, code: &str) -> Result<ValueRef, RuntimeError> {
        self.log.lock().unwrap().push(code.to_string());
        let code = code.trim();
        if let Some(ms) = code.strip_prefix("sleep:").and_then(|s| s.parse::<u64>().ok()) {
            std::thread::sleep(std::time::Duration::from_millis(ms));
            return Ok(Arc::new(Value::Int(ms as i64)));
        }
        let value = match code.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(code.to_string()),
        };
        Ok(Arc::new(value))
    }

    fn call_function(&mut self, name: &str, args: &[ValueRef]) -> Result<ValueRef, RuntimeError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}/{}", name, args.len()));
        Ok(Arc::new(Value::Str(name.to_string())))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn language(&self) -> &str {
        self.language
    }

    fn captured_output(&mut self) -> String {
        String::new()
    }
}
