//! Scripted `CommandRunner` implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::collector::exec::ExecError;
use crate::collector::traits::CommandRunner;

type Response = Result<String, ExecError>;

/// Runner returning scripted responses per program.
///
/// Responses queued for a program are consumed in order; the last one is
/// repeated for every further call. Programs without responses fail.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<HashMap<String, VecDeque<Response>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `program` (builder form).
    pub fn on(self, program: &str, response: Response) -> Self {
        self.push(program, response);
        self
    }

    /// Makes every call sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a response for `program`.
    pub fn push(&self, program: &str, response: Response) {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        responses
            .entry(program.to_string())
            .or_default()
            .push_back(response);
    }

    /// Drops queued responses for `program` and queues `response` instead.
    pub fn replace(&self, program: &str, response: Response) {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        responses.insert(program.to_string(), VecDeque::from([response]));
    }

    /// Command lines seen so far, program and arguments joined by spaces.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String, ExecError> {
        let mut line = vec![program.to_string()];
        line.extend(args.iter().cloned());
        let command = line.join(" ");
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(command.clone());

        if let Some(delay) = self.delay {
            if delay >= timeout {
                thread::sleep(timeout);
                return Err(ExecError::Timeout {
                    command,
                    after: timeout,
                });
            }
            thread::sleep(delay);
        }

        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        match responses.get_mut(program) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| missing(command)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| missing(command)),
            None => missing(command),
        }
    }
}

fn missing(command: String) -> Response {
    Err(ExecError::Failed {
        command,
        message: "no scripted response".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_are_consumed_then_repeated() {
        let runner = MockRunner::new()
            .on("sdiag", Ok("first".to_string()))
            .on("sdiag", Ok("second".to_string()));
        let t = Duration::from_secs(1);
        assert_eq!(runner.run("sdiag", &[], t).unwrap(), "first");
        assert_eq!(runner.run("sdiag", &[], t).unwrap(), "second");
        assert_eq!(runner.run("sdiag", &[], t).unwrap(), "second");
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_unknown_program_fails() {
        let runner = MockRunner::new();
        let err = runner.run("sacct", &[], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ExecError::Failed { .. }));
    }

    #[test]
    fn test_delay_beyond_timeout_is_timeout() {
        let runner = MockRunner::new()
            .on("sdiag", Ok("late".to_string()))
            .with_delay(Duration::from_millis(50));
        let err = runner
            .run("sdiag", &[], Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }
}
