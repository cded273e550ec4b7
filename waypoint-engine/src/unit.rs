//! Migration units and the sources that load them.
//!
//! A unit exposes two entry points, `up` and `down`. Each receives a [`Done`]
//! handle and must finish it exactly once, possibly from another thread. The
//! handle is consumed on use, so finishing twice does not compile; never
//! finishing is caught by the runner's timeout.
//!
//! Two sources are provided:
//! - [`ScriptSource`] runs unit files through `node` (CoffeeScript units via
//!   its `register` hook), one interpreter process per invocation. The
//!   process is killed once the runner stops waiting for it.
//! - [`CompiledSource`] serves units registered in-process by id.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::oneshot;

use waypoint_core::{registry, Direction, ScriptKind, UnitId};

use crate::error::EngineError;

/// Failure payload a unit reports through [`Done::fail`].
pub type UnitFailure = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type Completion = oneshot::Receiver<Result<(), UnitFailure>>;

// ---------------------------------------------------------------------------
// Completion handle
// ---------------------------------------------------------------------------

/// Single-use completion signal handed to a unit's entry point.
#[derive(Debug)]
pub struct Done {
    tx: oneshot::Sender<Result<(), UnitFailure>>,
}

impl Done {
    pub(crate) fn channel() -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Signal success.
    pub fn ok(self) {
        self.finish(Ok(()));
    }

    /// Signal failure.
    pub fn fail(self, err: impl Into<UnitFailure>) {
        self.finish(Err(err.into()));
    }

    /// Resolves once the runner has stopped listening, e.g. after a timeout.
    pub async fn abandoned(&mut self) {
        self.tx.closed().await
    }

    pub fn finish(self, result: Result<(), UnitFailure>) {
        if self.tx.send(result).is_err() {
            // The runner already timed out and stopped listening.
            tracing::debug!("ignoring completion signal from abandoned unit");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit contract
// ---------------------------------------------------------------------------

/// A reversible migration step.
pub trait Unit: Send + Sync {
    fn up(&self, done: Done);
    fn down(&self, done: Done);

    fn invoke(&self, direction: Direction, done: Done) {
        match direction {
            Direction::Up => self.up(done),
            Direction::Down => self.down(done),
        }
    }
}

/// Produces runnable units for ids found in the migrations directory.
pub trait UnitSource {
    fn load(&self, dir: &Path, unit: &UnitId) -> Result<Arc<dyn Unit>, EngineError>;
}

/// [`Unit`] built from two closures.
pub struct FnUnit<U, D> {
    up: U,
    down: D,
}

impl<U, D> FnUnit<U, D>
where
    U: Fn(Done) + Send + Sync,
    D: Fn(Done) + Send + Sync,
{
    pub fn new(up: U, down: D) -> Self {
        Self { up, down }
    }
}

impl<U, D> Unit for FnUnit<U, D>
where
    U: Fn(Done) + Send + Sync,
    D: Fn(Done) + Send + Sync,
{
    fn up(&self, done: Done) {
        (self.up)(done)
    }

    fn down(&self, done: Done) {
        (self.down)(done)
    }
}

// ---------------------------------------------------------------------------
// Compiled units
// ---------------------------------------------------------------------------

/// Units compiled into the host program, looked up by id.
#[derive(Default, Clone)]
pub struct CompiledSource {
    units: BTreeMap<UnitId, Arc<dyn Unit>>,
}

impl CompiledSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<UnitId>, unit: impl Unit + 'static) -> &mut Self {
        self.units.insert(id.into(), Arc::new(unit));
        self
    }

    pub fn with(mut self, id: impl Into<UnitId>, unit: impl Unit + 'static) -> Self {
        self.register(id, unit);
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = &UnitId> {
        self.units.keys()
    }
}

impl UnitSource for CompiledSource {
    fn load(&self, _dir: &Path, unit: &UnitId) -> Result<Arc<dyn Unit>, EngineError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| EngineError::UnitLoad {
                unit: unit.clone(),
                reason: "no compiled unit registered under this id".to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Script units
// ---------------------------------------------------------------------------

/// Runs unit files with an external interpreter.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    kind: ScriptKind,
    program: OsString,
}

impl ScriptSource {
    pub fn new(kind: ScriptKind) -> Self {
        Self {
            kind,
            program: OsString::from("node"),
        }
    }

    /// Use a different interpreter binary (must accept `-e <script>`).
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

impl UnitSource for ScriptSource {
    fn load(&self, dir: &Path, unit: &UnitId) -> Result<Arc<dyn Unit>, EngineError> {
        let path = registry::unit_path(dir, unit);
        if !path.is_file() {
            return Err(EngineError::UnitLoad {
                unit: unit.clone(),
                reason: format!("file not found: {}", path.display()),
            });
        }
        Ok(Arc::new(ScriptUnit {
            path,
            kind: self.kind,
            program: self.program.clone(),
        }))
    }
}

struct ScriptUnit {
    path: PathBuf,
    kind: ScriptKind,
    program: OsString,
}

impl ScriptUnit {
    fn spawn(&self, direction: Direction, done: Done) {
        let mut command = Command::new(&self.program);
        command
            .arg("-e")
            .arg(bootstrap(&self.path, self.kind, direction))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let label = self.path.display().to_string();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(supervise(command, label, done));
            }
            Err(e) => done.fail(format!("cannot run {label} outside a tokio runtime: {e}")),
        }
    }
}

/// Wait for the interpreter and translate its exit into a completion signal.
///
/// Dropping the child kills it, so losing the race against
/// [`Done::abandoned`] stops a unit that outlived its timeout.
async fn supervise(mut command: Command, label: String, mut done: Done) {
    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return done.fail(format!("failed to start {label}: {e}")),
    };

    let exited = tokio::select! {
        output = child.wait_with_output() => Some(output),
        _ = done.abandoned() => None,
    };

    match exited {
        Some(Ok(output)) if output.status.success() => done.ok(),
        Some(Ok(output)) if output.status.code() == Some(NOT_FINISHED_EXIT) => {
            // The unit returned without calling back. Leave the handle open
            // so the runner's timeout decides.
            tracing::warn!("{label} exited without signalling completion");
            done.abandoned().await;
        }
        Some(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            done.fail(format!("{label} exited with {}: {stderr}", output.status));
        }
        Some(Err(e)) => done.fail(format!("failed to wait for {label}: {e}")),
        None => tracing::warn!("killed {label}: runner stopped waiting"),
    }
}

impl Unit for ScriptUnit {
    fn up(&self, done: Done) {
        self.spawn(Direction::Up, done);
    }

    fn down(&self, done: Done) {
        self.spawn(Direction::Down, done);
    }
}

/// Exit code of an interpreter whose unit drained its event loop without
/// ever invoking the completion callback.
const NOT_FINISHED_EXIT: i32 = 86;

/// Interpreter snippet that loads the unit and maps its callback to an exit code.
fn bootstrap(path: &Path, kind: ScriptKind, direction: Direction) -> String {
    let module = serde_json::to_string(&path.to_string_lossy()).unwrap_or_default();
    let register = match kind {
        ScriptKind::Js => "",
        ScriptKind::Coffee => {
            "try { require('coffeescript/register'); } catch (e) { require('coffee-script/register'); }\n"
        }
    };
    format!(
        "{register}var called = false;\n\
         process.on('beforeExit', function () {{ if (!called) process.exit({NOT_FINISHED_EXIT}); }});\n\
         require({module}).{direction}(function (err) {{\n\
         \x20 called = true;\n\
         \x20 if (err) {{ console.error(err && err.stack ? err.stack : String(err)); process.exit(1); }}\n\
         \x20 process.exit(0);\n\
         }});\n"
    )
}
