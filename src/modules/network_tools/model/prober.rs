use super::host_result::HostResult;
use crate::core::operator::{Operator, ShellCommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;

/// Results of every host probed so far, keyed by host.
pub type ResultTable = BTreeMap<String, HostResult>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no hosts have been probed yet")]
    EmptyResultSet,
}

/// Fixed settings of a [`Prober`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    use_ipv6: bool,
    interface: Option<String>,
    echo_count: u32,
    max_workers: usize,
}

impl ProbeConfig {
    /// Counts below 1 are raised to 1.
    pub fn new(use_ipv6: bool, interface: Option<String>, echo_count: i64, max_workers: i64) -> Self {
        Self {
            use_ipv6,
            interface: interface.filter(|i| !i.is_empty()),
            echo_count: echo_count.clamp(1, u32::MAX as i64) as u32,
            max_workers: max_workers.max(1).try_into().unwrap_or(usize::MAX),
        }
    }

    pub fn use_ipv6(&self) -> bool {
        self.use_ipv6
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn echo_count(&self) -> u32 {
        self.echo_count
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn ping_variant(&self) -> &'static str {
        if self.use_ipv6 {
            "ping6"
        } else {
            "ping"
        }
    }

    /// Number of worker threads used for a round of `host_count` hosts.
    pub fn pool_size(&self, host_count: usize) -> usize {
        host_count.min(self.max_workers)
    }

    /// `<ping|ping6> -c <count> [-I <interface>] <host>`
    pub fn command_for(&self, host: &str) -> ShellCommand {
        let mut cmd = ShellCommand::new(self.ping_variant())
            .arg("-c")
            .arg(self.echo_count.to_string());
        if let Some(interface) = &self.interface {
            cmd = cmd.arg("-I").arg(interface.clone());
        }
        cmd.arg(host)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::new(false, None, 5, 4)
    }
}

/// Up/down counts over a [`ResultTable`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct StatusSummary {
    pub num: usize,
    pub up: usize,
    pub down: usize,
    /// `up / num`, so `1.0` when every host answered
    pub ratio: f64,
}

impl StatusSummary {
    pub fn from_results(results: &ResultTable) -> Result<Self, ProbeError> {
        let num = results.len();
        if num == 0 {
            return Err(ProbeError::EmptyResultSet);
        }
        let up = results.values().filter(|r| r.up).count();

        Ok(Self {
            num,
            up,
            down: num - up,
            ratio: up as f64 / num as f64,
        })
    }
}

/// Sends pings to many hosts in parallel and keeps the parsed results.
pub struct Prober {
    operator: Arc<dyn Operator>,
    config: ProbeConfig,
    results: Mutex<ResultTable>,
}

impl Prober {
    pub fn new(operator: Arc<dyn Operator>, config: ProbeConfig) -> Self {
        operator.log(
            "ping tool startup done",
            Some(json!({
                "pingc": config.ping_variant(),
                "net_if": config.interface(),
                "num": config.echo_count(),
            })),
            false,
            false,
        );

        Self {
            operator,
            config,
            results: Mutex::new(ResultTable::new()),
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probes every host, at most `max_workers` at a time, and blocks until
    /// all of them are done. Earlier results for the same hosts are
    /// replaced; other entries are kept.
    pub fn probe<S: AsRef<str>>(&self, hosts: &[S]) {
        let pool_size = self.config.pool_size(hosts.len());
        if pool_size == 0 {
            return;
        }

        let queue: Mutex<VecDeque<&str>> = Mutex::new(hosts.iter().map(|h| h.as_ref()).collect());

        thread::scope(|scope| {
            for _ in 0..pool_size {
                scope.spawn(|| loop {
                    // the guard is dropped before the probe runs
                    let next = match queue.lock() {
                        Ok(mut queue) => queue.pop_front(),
                        Err(poisoned) => poisoned.into_inner().pop_front(),
                    };
                    match next {
                        Some(host) => self.single_probe(host),
                        None => break,
                    }
                });
            }
        });
    }

    fn single_probe(&self, host: &str) {
        self.operator.log(&format!("probing: {}", host), None, false, true);

        let command = self.config.command_for(host);
        let result = match self.operator.run(&command) {
            Ok(output) => HostResult::from_output(output.returncode, &output.out),
            Err(e) => {
                self.operator.log(
                    &format!("could not run ping for {}", host),
                    Some(json!({ "command": command.to_string(), "error": e.to_string() })),
                    true,
                    true,
                );
                HostResult::down()
            }
        };

        for warning in result.warnings() {
            self.operator.log(
                &format!("{}: {}", host, warning),
                Some(json!({ "command": command.to_string() })),
                false,
                true,
            );
        }

        self.lock_results().insert(host.to_string(), result);
    }

    /// Snapshot of all results collected so far.
    pub fn results(&self) -> ResultTable {
        self.lock_results().clone()
    }

    pub fn status(&self) -> Result<StatusSummary, ProbeError> {
        StatusSummary::from_results(&self.lock_results())
    }

    fn lock_results(&self) -> std::sync::MutexGuard<'_, ResultTable> {
        // a panicking worker cannot leave a half-written entry behind
        self.results.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operator::{CommandOutput, OperatorError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const UP_OUTPUT: &str = "\
64 bytes from h: icmp_seq=1 time=1.0 ms
64 bytes from h: icmp_seq=2 time=3.0 ms
2 packets transmitted, 2 received, 0% packet loss
rtt min/avg/max/stddev = 1.0/2.0/3.0/1.0 ms
";

    /// Answers each host with a scripted exit code and tracks concurrency.
    #[derive(Default)]
    struct ScriptedOperator {
        exit_codes: HashMap<String, i32>,
        delay: Duration,
        commands: Mutex<Vec<ShellCommand>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl ScriptedOperator {
        fn with_codes(codes: &[(&str, i32)]) -> Self {
            Self {
                exit_codes: codes.iter().map(|(h, c)| (h.to_string(), *c)).collect(),
                ..Default::default()
            }
        }

        fn commands(&self) -> Vec<ShellCommand> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl Operator for ScriptedOperator {
        fn run(&self, command: &ShellCommand) -> Result<CommandOutput, OperatorError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.commands.lock().unwrap().push(command.clone());
            self.running.fetch_sub(1, Ordering::SeqCst);

            let host = command.args.last().cloned().unwrap_or_default();
            let returncode = self.exit_codes.get(&host).copied().unwrap_or(0);
            Ok(CommandOutput {
                returncode,
                out: UP_OUTPUT.to_string(),
            })
        }

        fn log(&self, _message: &str, _metadata: Option<serde_json::Value>, _critical: bool, _verbose: bool) {}
    }

    struct BrokenOperator;

    impl Operator for BrokenOperator {
        fn run(&self, command: &ShellCommand) -> Result<CommandOutput, OperatorError> {
            Err(OperatorError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no ping"),
            })
        }

        fn log(&self, _message: &str, _metadata: Option<serde_json::Value>, _critical: bool, _verbose: bool) {}
    }

    #[test]
    fn test_non_positive_counts_are_clamped() {
        let config = ProbeConfig::new(false, None, 0, -3);
        assert_eq!(config.echo_count(), 1);
        assert_eq!(config.max_workers(), 1);
        assert_eq!(config.pool_size(10), 1);

        let op = Arc::new(ScriptedOperator::default());
        let prober = Prober::new(op.clone(), ProbeConfig::new(false, None, -7, 1));
        prober.probe(&["h"]);
        assert_eq!(op.commands()[0].args, vec!["-c", "1", "h"]);
    }

    #[test]
    fn test_pool_size_is_bounded_by_host_count() {
        let config = ProbeConfig::new(false, None, 3, 16);
        assert_eq!(config.pool_size(3), 3);
        assert_eq!(config.pool_size(0), 0);
    }

    #[test]
    fn test_command_line() {
        let config = ProbeConfig::new(true, Some("eth1".to_string()), 4, 2);
        assert_eq!(config.command_for("::1").to_string(), "ping6 -c 4 -I eth1 ::1");

        let config = ProbeConfig::new(false, Some(String::new()), 2, 2);
        assert_eq!(config.command_for("10.0.0.1").to_string(), "ping -c 2 10.0.0.1");
    }

    #[test]
    fn test_probe_respects_worker_limit() {
        let op = Arc::new(ScriptedOperator {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let prober = Prober::new(op.clone(), ProbeConfig::new(false, None, 1, 2));

        prober.probe(&["a", "b", "c"]);

        assert!(op.max_running.load(Ordering::SeqCst) <= 2);
        let results = prober.results();
        assert_eq!(results.len(), 3);
        assert!(results.values().all(|r| r.up));
    }

    #[test]
    fn test_down_host_has_no_details() {
        let op = Arc::new(ScriptedOperator::with_codes(&[("dead", 1)]));
        let prober = Prober::new(op, ProbeConfig::default());

        prober.probe(&["dead", "alive"]);

        let results = prober.results();
        assert_eq!(results["dead"], HostResult::down());
        let alive = results["alive"].details.as_ref().unwrap();
        assert_eq!(alive.ms, vec![1.0, 3.0]);
        assert_eq!(alive.rtt.unwrap().avg, 2.0);
    }

    #[test]
    fn test_status_ratio() {
        let op = Arc::new(ScriptedOperator::with_codes(&[("d", 2)]));
        let prober = Prober::new(op, ProbeConfig::default());

        prober.probe(&["a", "b", "c", "d"]);

        assert_eq!(
            prober.status().unwrap(),
            StatusSummary {
                num: 4,
                up: 3,
                down: 1,
                ratio: 0.75
            }
        );
    }

    #[test]
    fn test_status_on_empty_table() {
        let prober = Prober::new(Arc::new(ScriptedOperator::default()), ProbeConfig::default());
        prober.probe::<&str>(&[]);
        assert!(matches!(prober.status(), Err(ProbeError::EmptyResultSet)));
    }

    #[test]
    fn test_reprobe_overwrites_and_keeps_others() {
        let first = Arc::new(ScriptedOperator::default());
        let prober = Prober::new(first, ProbeConfig::default());
        prober.probe(&["a", "b"]);

        // swap the operator to make "a" fail on the second round
        let prober = Prober {
            operator: Arc::new(ScriptedOperator::with_codes(&[("a", 1)])),
            config: prober.config.clone(),
            results: Mutex::new(prober.results()),
        };
        prober.probe(&["a"]);

        let results = prober.results();
        assert_eq!(results.len(), 2);
        assert!(!results["a"].up);
        assert!(results["b"].up);
    }

    #[test]
    fn test_reprobe_same_host_keeps_one_entry() {
        let prober = Prober::new(Arc::new(ScriptedOperator::default()), ProbeConfig::default());
        prober.probe(&["a"]);
        prober.probe(&["a"]);
        assert_eq!(prober.results().len(), 1);
    }

    #[test]
    fn test_spawn_failure_marks_host_down() {
        let prober = Prober::new(Arc::new(BrokenOperator), ProbeConfig::default());
        prober.probe(&["a"]);
        assert_eq!(prober.results()["a"], HostResult::down());
    }
}
