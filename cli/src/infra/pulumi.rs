//! Infrastructure implementation of the automation engine ports.
//!
//! `PulumiCli<R>` drives the `pulumi` command-line tool through a
//! `CommandRunner`. Each stack gets its own working directory holding the
//! project file (`Pulumi.yaml`) and the stack settings file
//! (`Pulumi.<stack>.yaml`), so persisted configuration and the encrypted key
//! round-trip through files the engine owns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::application::ports::{
    CommandRunner, ProcessOptions, StackConfigurator, StackOperations, StackWorkspace,
};
use crate::domain::pulumi::{
    ConfigValue, OperationOptions, OperationSummary, ProjectSettings, Stack, StackSettings,
};
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, LONG_OPERATION_TIMEOUT, checked};

const PULUMI: &str = "pulumi";

/// Environment applied to every engine call on top of the stack's own.
const BASE_ENV: &[(&str, &str)] = &[("PULUMI_SKIP_UPDATE_CHECK", "true")];

#[derive(Serialize)]
struct ProjectFile<'a> {
    name: &'a str,
    runtime: &'a str,
    main: &'a Path,
    backend: BackendSection<'a>,
}

#[derive(Serialize)]
struct BackendSection<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ConfigGet {
    value: String,
    #[serde(default)]
    secret: bool,
}

/// Infrastructure adapter that routes all `pulumi` calls through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct PulumiCli<R: CommandRunner> {
    runner: R,
    root: TempDir,
}

impl<R: CommandRunner> PulumiCli<R> {
    /// Create an adapter whose stack directories live in a fresh temporary
    /// directory, removed when the adapter is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new(runner: R) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("dsh-pulumi-")
            .tempdir()
            .context("cannot create Pulumi workspace directory")?;
        Ok(Self { runner, root })
    }

    fn settings_path(stack: &Stack) -> PathBuf {
        stack.work_dir.join(format!("Pulumi.{}.yaml", stack.name))
    }

    fn env(stack: &Stack) -> Vec<(String, String)> {
        BASE_ENV
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .chain(stack.env.iter().cloned())
            .collect()
    }

    /// Run `pulumi <args> --stack <name> --non-interactive --color never`
    /// in the stack's directory and return stdout. The flags go before any
    /// `--` so positional values stay positional.
    async fn pulumi(&self, stack: &Stack, args: &[&str], timeout: Duration) -> Result<String> {
        let split = args.iter().position(|a| *a == "--").unwrap_or(args.len());
        let mut full: Vec<&str> = args[..split].to_vec();
        full.extend(["--stack", stack.name.as_str(), "--non-interactive", "--color", "never"]);
        full.extend_from_slice(&args[split..]);
        self.exec(stack, &full, timeout).await
    }

    async fn exec(&self, stack: &Stack, args: &[&str], timeout: Duration) -> Result<String> {
        let env = Self::env(stack);
        let output = self
            .runner
            .run_with_options(
                PULUMI,
                args,
                &ProcessOptions {
                    env: &env,
                    cwd: Some(stack.work_dir.as_path()),
                    timeout: Some(timeout),
                },
            )
            .await?;
        let label = command_label(args);
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(target: "pulumi", "{line}");
        }
        Ok(checked(&label, &output)?)
    }

    async fn operation(
        &self,
        stack: &Stack,
        verb: &str,
        options: OperationOptions,
    ) -> Result<OperationSummary> {
        let parallel = options.parallel.map(|n| n.to_string());
        let mut args = vec![verb];
        if verb != "preview" {
            args.extend(["--yes", "--skip-preview"]);
        }
        if options.diff {
            args.push("--diff");
        }
        if let Some(parallel) = parallel.as_deref() {
            args.extend(["--parallel", parallel]);
        }
        if options.verbose {
            args.extend(["--debug", "--logtostderr", "-v=9"]);
        }
        let stdout = self.pulumi(stack, &args, LONG_OPERATION_TIMEOUT).await?;
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!(target: "pulumi", "{line}");
        }
        Ok(OperationSummary::succeeded(stdout))
    }
}

/// Program name plus leading subcommand words, for error messages.
fn command_label(args: &[&str]) -> String {
    let words: Vec<&str> = args
        .iter()
        .take_while(|a| !a.starts_with('-'))
        .take(2)
        .copied()
        .collect();
    format!("{PULUMI} {}", words.join(" "))
}

impl<R: CommandRunner> StackWorkspace for PulumiCli<R> {
    async fn create_or_select_stack(
        &self,
        project: &ProjectSettings,
        stack_name: &str,
        settings: &StackSettings,
        env: &[(String, String)],
    ) -> Result<Stack> {
        let stack = Stack {
            project_name: project.name.clone(),
            name: stack_name.to_string(),
            work_dir: self.root.path().join(stack_name),
            env: env.to_vec(),
        };
        std::fs::create_dir_all(&stack.work_dir)
            .with_context(|| format!("cannot create {}", stack.work_dir.display()))?;

        let project_file = ProjectFile {
            name: &project.name,
            runtime: &project.runtime,
            main: &project.main,
            backend: BackendSection {
                url: &project.backend_url,
            },
        };
        let project_yaml = serde_yaml::to_string(&project_file).context("cannot serialize Pulumi.yaml")?;
        std::fs::write(stack.work_dir.join("Pulumi.yaml"), project_yaml)
            .context("cannot write Pulumi.yaml")?;

        let settings_yaml = serde_yaml::to_string(settings).context("cannot serialize stack settings")?;
        std::fs::write(Self::settings_path(&stack), settings_yaml)
            .context("cannot write stack settings")?;

        let mut args = vec!["stack", "select", "--create"];
        if let Some(provider) = settings.secrets_provider.as_deref() {
            args.extend(["--secrets-provider", provider]);
        }
        self.pulumi(&stack, &args, DEFAULT_CMD_TIMEOUT).await?;
        Ok(stack)
    }

    async fn stack_settings(&self, stack: &Stack) -> Result<StackSettings> {
        let path = Self::settings_path(stack);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    async fn install_plugin(&self, stack: &Stack, name: &str, version: &str) -> Result<()> {
        self.exec(
            stack,
            &["plugin", "install", "resource", name, version, "--non-interactive"],
            LONG_OPERATION_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn remove_stack(&self, stack: &Stack) -> Result<()> {
        self.pulumi(stack, &["stack", "rm", "--yes"], DEFAULT_CMD_TIMEOUT)
            .await?;
        Ok(())
    }
}

impl<R: CommandRunner> StackConfigurator for PulumiCli<R> {
    async fn get_config(&self, stack: &Stack, key: &str) -> Result<ConfigValue> {
        let stdout = self
            .pulumi(stack, &["config", "get", "--json", "--", key], DEFAULT_CMD_TIMEOUT)
            .await?;
        let parsed: ConfigGet =
            serde_json::from_str(&stdout).with_context(|| format!("cannot parse value of {key}"))?;
        Ok(ConfigValue {
            value: parsed.value,
            secret: parsed.secret,
        })
    }

    async fn set_config(&self, stack: &Stack, key: &str, value: &ConfigValue) -> Result<()> {
        let kind = if value.secret { "--secret" } else { "--plaintext" };
        self.pulumi(
            stack,
            &["config", "set", kind, "--", key, value.value.as_str()],
            DEFAULT_CMD_TIMEOUT,
        )
        .await?;
        Ok(())
    }
}

impl<R: CommandRunner> StackOperations for PulumiCli<R> {
    async fn refresh(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.operation(stack, "refresh", options).await
    }

    async fn preview(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.operation(stack, "preview", options).await
    }

    async fn up(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.operation(stack, "up", options).await
    }

    async fn destroy(&self, stack: &Stack, options: OperationOptions) -> Result<OperationSummary> {
        self.operation(stack, "destroy", options).await
    }

    async fn cancel(&self, stack: &Stack) -> Result<()> {
        self.pulumi(stack, &["cancel", "--yes"], DEFAULT_CMD_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn outputs(&self, stack: &Stack) -> Result<BTreeMap<String, serde_json::Value>> {
        let stdout = self
            .pulumi(
                stack,
                &["stack", "output", "--json", "--show-secrets"],
                DEFAULT_CMD_TIMEOUT,
            )
            .await?;
        serde_json::from_str(&stdout).context("cannot parse stack outputs")
    }

    async fn run_command(&self, stack: &Stack, args: &[&str]) -> Result<String> {
        self.pulumi(stack, args, LONG_OPERATION_TIMEOUT).await
    }
}
