//! Out-of-process SMT-LIB2 backend.
//!
//! Spawns a solver (by default `z3 -in -smt2`) and drives it incrementally
//! over stdin/stdout. Committed assumptions live in solver scopes, one
//! `(push 1)` each; a check runs in a throwaway scope.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, trace, warn};

use symdec_core::{Clause, Expr, HeapObject, HeapPos, ReferenceSymbolic};

use super::encode::SmtEncoder;
use super::{require_predicate, ExternalInterface, ProtocolSession};
use crate::error::ExternalError;

const PRELUDE: &[&str] = &[
    "(set-option :print-success false)",
    "(set-option :global-declarations true)",
    "(set-logic ALL)",
];

const PROBE: &str = "symdec-ready";

pub struct SmtLibProcess {
    name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    session: ProtocolSession,
    encoder: SmtEncoder,
    probed: Option<bool>,
    reaped: bool,
}

impl std::fmt::Debug for SmtLibProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtLibProcess")
            .field("name", &self.name)
            .field("session", &self.session)
            .field("probed", &self.probed)
            .finish()
    }
}

impl SmtLibProcess {
    /// Spawn `command args..` and send the prelude.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, ExternalError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExternalError::bad_response("solver pipes unavailable"));
        };
        debug!(command, ?args, "spawned solver");

        let mut process = Self {
            name: command.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            session: ProtocolSession::new(),
            encoder: SmtEncoder::new(),
            probed: None,
            reaped: false,
        };
        for line in PRELUDE {
            process.send(line)?;
        }
        Ok(process)
    }

    /// Whether `command --version` runs on this system.
    pub fn is_available(command: &str) -> bool {
        Command::new(command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    fn send(&mut self, line: &str) -> Result<(), ExternalError> {
        trace!(solver = %self.name, "> {}", line);
        writeln!(self.stdin, "{}", line)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<String, ExternalError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{} closed its output", self.name),
            )
            .into());
        }
        let line = line.trim().to_string();
        trace!(solver = %self.name, "< {}", line);
        Ok(line)
    }

    fn stage(&mut self, clause: Clause) -> Result<(), ExternalError> {
        self.session.stage(clause)?;
        Ok(())
    }

    /// Encode the staged clause and declare any new symbols.
    fn staged_assertion(&mut self, positive: bool) -> Result<String, ExternalError> {
        let clause = self.session.current()?.clone();
        let encoded = self.encoder.encode(&clause, positive)?;
        for declaration in &encoded.declarations {
            self.send(declaration)?;
        }
        Ok(encoded.assertion)
    }

    fn reap(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }
}

impl ExternalInterface for SmtLibProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_working(&mut self) -> Result<bool, ExternalError> {
        if !self.session.is_live() {
            return Ok(false);
        }
        if let Some(working) = self.probed {
            return Ok(working);
        }
        let reply = self
            .send(&format!("(echo \"{}\")", PROBE))
            .and_then(|_| self.receive());
        let working = match reply {
            Ok(line) => line.trim_matches('"') == PROBE,
            Err(e) => {
                warn!(solver = %self.name, error = %e, "solver probe failed");
                false
            }
        };
        self.probed = Some(working);
        Ok(working)
    }

    fn send_clause_assume(&mut self, predicate: &Expr) -> Result<(), ExternalError> {
        require_predicate(predicate)?;
        self.stage(Clause::numeric(predicate.clone()))
    }

    fn send_clause_assume_aliases(
        &mut self,
        reference: &ReferenceSymbolic,
        heap_pos: HeapPos,
        object: &HeapObject,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::aliases(reference.clone(), heap_pos, object.clone()))
    }

    fn send_clause_assume_expands(
        &mut self,
        reference: &ReferenceSymbolic,
        class_name: &str,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::expands(reference.clone(), class_name))
    }

    fn send_clause_assume_null(
        &mut self,
        reference: &ReferenceSymbolic,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::null(reference.clone()))
    }

    fn send_clause_assume_class_initialized(
        &mut self,
        class_name: &str,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::initialized(class_name))
    }

    fn send_clause_assume_class_not_initialized(
        &mut self,
        class_name: &str,
    ) -> Result<(), ExternalError> {
        self.stage(Clause::not_initialized(class_name))
    }

    fn retract_clause(&mut self) -> Result<(), ExternalError> {
        self.session.retract()?;
        Ok(())
    }

    fn check_sat(&mut self, positive: bool) -> Result<bool, ExternalError> {
        let assertion = self.staged_assertion(positive)?;
        self.send("(push 1)")?;
        self.send(&format!("(assert {})", assertion))?;
        self.send("(check-sat)")?;
        let reply = self.receive()?;
        self.send("(pop 1)")?;
        debug!(solver = %self.name, positive, reply = %reply, "check-sat");
        match reply.as_str() {
            "sat" | "unknown" => Ok(true),
            "unsat" => Ok(false),
            other => Err(ExternalError::bad_response(format!(
                "unexpected solver output: {}",
                other
            ))),
        }
    }

    fn push_assumption(&mut self, positive: bool) -> Result<(), ExternalError> {
        let assertion = self.staged_assertion(positive)?;
        self.send("(push 1)")?;
        self.send(&format!("(assert {})", assertion))?;
        self.session.commit()?;
        Ok(())
    }

    fn pop_assumption(&mut self) -> Result<(), ExternalError> {
        self.session.pop()?;
        self.send("(pop 1)")
    }

    fn clear(&mut self) -> Result<(), ExternalError> {
        let depth = self.session.clear()?;
        if depth > 0 {
            self.send(&format!("(pop {})", depth))?;
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<(), ExternalError> {
        self.session.quit()?;
        let sent = self.send("(exit)");
        let _ = self.child.wait();
        self.reaped = true;
        debug!(solver = %self.name, "solver quit");
        sent
    }

    fn fail(&mut self) {
        if self.session.is_live() {
            warn!(solver = %self.name, "solver session failed");
        }
        self.session.fail();
        self.reap();
    }
}

impl Drop for SmtLibProcess {
    fn drop(&mut self) {
        self.reap();
    }
}
