use std::io::Write;
use std::process::Command;

use anyhow::Context;
use serde::Serialize;
use which::which;

use crate::planner::{BuildPlan, Invocation, Target};

const BANNER: &str = "==========================";

/// Exit status and captured streams of one fpm run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Text reported when the run failed: stdout followed by anything on stderr.
    pub fn failure_output(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

pub trait CommandRunner {
    /// Shell text that will be run for `invocation`, including environment overrides.
    fn describe(&self, invocation: &Invocation) -> String;

    fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutput>;
}

/// Runs fpm through `/bin/sh -c`, so quoting inside tokens is interpreted by the shell.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    program: String,
}

impl ShellRunner {
    pub fn new(program: &str) -> Result<Self, ExecutionError> {
        let resolved = which(program).map_err(|_| ExecutionError::ToolNotFound {
            program: program.to_string(),
        })?;
        log::debug!("using {} at {}", program, resolved.display());

        Ok(Self {
            program: program.to_string(),
        })
    }
}

impl CommandRunner for ShellRunner {
    fn describe(&self, invocation: &Invocation) -> String {
        invocation.display_command(&self.program)
    }

    fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutput> {
        let command = invocation.shell_command(&self.program);
        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .envs(invocation.env.iter().cloned())
            .output()
            .with_context(|| format!("running shell command: {command}"))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.trim().is_empty() {
            log::warn!("{} wrote to stderr: {}", self.program, stderr.trim_end());
        }

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub invocations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Error trying to run FPM for {dist}!\n{output}")]
    PrimaryFailed { dist: String, output: String },
    #[error("Error trying to run FPM for the termini for {dist}!\n{output}")]
    TerminiFailed { dist: String, output: String },
    #[error("could not find '{program}' on PATH")]
    ToolNotFound { program: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs the primary invocation and then, if planned, the termini one. Output of each
/// successful run is copied to `out`; the first failure stops the plan.
pub fn execute_plan<R, W>(
    plan: &BuildPlan,
    runner: &R,
    out: &mut W,
    debug: bool,
) -> Result<ExecutionResult, ExecutionError>
where
    R: CommandRunner,
    W: Write,
{
    let mut completed = 0;
    for invocation in std::iter::once(&plan.primary).chain(plan.termini.as_ref()) {
        run_invocation(plan, invocation, runner, out, debug)?;
        completed += 1;
    }

    Ok(ExecutionResult {
        invocations: completed,
    })
}

fn run_invocation<R, W>(
    plan: &BuildPlan,
    invocation: &Invocation,
    runner: &R,
    out: &mut W,
    debug: bool,
) -> Result<(), ExecutionError>
where
    R: CommandRunner,
    W: Write,
{
    let command = runner.describe(invocation);
    log::debug!("fpm command: {command}");

    if debug {
        let show_cwd = invocation.target == Target::Primary;
        write_debug_command(out, &command, show_cwd).context("writing debug output")?;
    }

    log::info!("running fpm ({:?}) for {}", invocation.target, plan.dist);
    let result = runner.run(invocation)?;

    if !result.success() {
        log::info!(
            "fpm ({:?}) for {} exited with {:?}",
            invocation.target,
            plan.dist,
            result.code
        );
        let dist = plan.dist.clone();
        let output = result.failure_output();
        return Err(match invocation.target {
            Target::Primary => ExecutionError::PrimaryFailed { dist, output },
            Target::Termini => ExecutionError::TerminiFailed { dist, output },
        });
    }

    forward_output(out, &result.stdout).context("forwarding fpm output")?;
    Ok(())
}

/// Copies `text` through unchanged, terminating it with a newline only if it lacks one.
fn forward_output<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn write_debug_command<W: Write>(
    out: &mut W,
    command: &str,
    show_cwd: bool,
) -> std::io::Result<()> {
    writeln!(out, "{BANNER}")?;
    writeln!(out, "FPM COMMAND")?;
    writeln!(out, "{command}")?;
    writeln!(out, "{BANNER}")?;
    if show_cwd {
        if let Ok(cwd) = std::env::current_dir() {
            writeln!(out, "{}", cwd.display())?;
        }
    }
    Ok(())
}
