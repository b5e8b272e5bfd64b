//! Runs embedded `PostgreSQL` lifecycle steps for the integration tests.
//!
//! ```text
//! pg_worker <setup|start|stop> <payload.json>
//! ```
//!
//! The payload is a `pg_embedded_setup_unpriv` worker payload carrying the
//! cluster settings and environment overrides. When launched as root the
//! worker re-executes itself as `nobody`, because `PostgreSQL` refuses to run
//! under the superuser account. `start` leaves the server running after the
//! worker exits.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let args = unix::collect_args()?;
    unix::reexec_unprivileged(&args)?;
    unix::run(&args).map_err(Into::into)
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker requires a Unix host".into())
}

#[cfg(unix)]
mod unix {
    use camino::{Utf8Path, Utf8PathBuf};
    use nix::unistd::{Uid, User, initgroups, setgid, setuid};
    use pg_embedded_setup_unpriv::ambient_dir_and_path;
    use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
    use postgresql_embedded::{PostgreSQL, Status};
    use std::env;
    use std::ffi::CString;
    use std::io::{self, Read};
    use std::mem::ManuallyDrop;
    use std::process::{Command, ExitStatus};
    use thiserror::Error;

    const REEXEC_MARKER: &str = "PG_WORKER_REEXEC";
    const TRUSTED_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";
    const SERVICE_USER: &str = "nobody";

    #[derive(Debug, Error)]
    pub enum WorkerFailure {
        #[error("usage: pg_worker <setup|start|stop> <payload.json>: {0}")]
        Usage(String),
        #[error("failed to read payload {path}: {source}")]
        PayloadRead {
            path: Utf8PathBuf,
            #[source]
            source: super::BoxError,
        },
        #[error("failed to parse payload: {0}")]
        PayloadParse(#[from] serde_json::Error),
        #[error("invalid cluster settings: {0}")]
        Settings(String),
        #[error("failed to start the worker runtime: {0}")]
        Runtime(#[source] io::Error),
        #[error("failed to switch to the nobody account: {0}")]
        Demotion(String),
        #[error("postgres {step} failed: {message}")]
        Postgres {
            step: &'static str,
            message: String,
        },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Setup,
        Start,
        Stop,
    }

    impl Step {
        fn parse(value: &str) -> Result<Self, WorkerFailure> {
            match value {
                "setup" => Ok(Self::Setup),
                "start" => Ok(Self::Start),
                "stop" => Ok(Self::Stop),
                other => Err(WorkerFailure::Usage(format!("unknown step `{other}`"))),
            }
        }
    }

    pub fn collect_args() -> Result<Vec<Utf8PathBuf>, WorkerFailure> {
        env::args_os()
            .map(|arg| {
                arg.into_string()
                    .map(Utf8PathBuf::from)
                    .map_err(|_| WorkerFailure::Usage("arguments must be UTF-8".to_owned()))
            })
            .collect()
    }

    /// Re-runs the worker as the service user and exits with its status.
    pub fn reexec_unprivileged(args: &[Utf8PathBuf]) -> Result<(), WorkerFailure> {
        if !Uid::effective().is_root() || env::var_os(REEXEC_MARKER).is_some() {
            return Ok(());
        }
        let exe = env::current_exe()
            .map_err(WorkerFailure::Runtime)?
            .into_os_string()
            .into_string()
            .map(Utf8PathBuf::from)
            .map_err(|_| WorkerFailure::Usage("worker path must be UTF-8".to_owned()))?;
        let forwarded = args.get(1..).unwrap_or_default();

        let status = match Command::new("runuser")
            .args(["-u", SERVICE_USER, "--"])
            .arg(exe.as_std_path())
            .args(forwarded.iter().map(|arg| arg.as_std_path()))
            .env(REEXEC_MARKER, "1")
            .env("PATH", TRUSTED_PATH)
            .status()
        {
            Ok(status) => status,
            Err(err) if err.kind() == io::ErrorKind::NotFound => reexec_with_su(&exe, forwarded)?,
            Err(err) => return Err(WorkerFailure::Demotion(err.to_string())),
        };
        std::process::exit(status.code().unwrap_or(1));
    }

    fn reexec_with_su(
        exe: &Utf8Path,
        forwarded: &[Utf8PathBuf],
    ) -> Result<ExitStatus, WorkerFailure> {
        let command = std::iter::once(exe)
            .chain(forwarded.iter().map(Utf8PathBuf::as_path))
            .map(|part| shell_quote(part.as_str()))
            .fold(format!("{REEXEC_MARKER}=1 exec"), |mut line, part| {
                line.push(' ');
                line.push_str(&part);
                line
            });
        Command::new("/bin/su")
            .args(["-s", "/bin/sh", SERVICE_USER, "-c"])
            .arg(command)
            .env("PATH", TRUSTED_PATH)
            .status()
            .map_err(|err| WorkerFailure::Demotion(err.to_string()))
    }

    pub fn run(args: &[Utf8PathBuf]) -> Result<(), WorkerFailure> {
        let (step, payload_path) = match args {
            [_, step, payload] => (Step::parse(step.as_str())?, payload),
            _ => {
                return Err(WorkerFailure::Usage(format!(
                    "expected two arguments, got {}",
                    args.len().saturating_sub(1)
                )));
            }
        };
        let payload = read_payload(payload_path)?;
        demote_to_service_user()?;
        let settings = payload
            .settings
            .into_settings()
            .map_err(|err| WorkerFailure::Settings(err.to_string()))?;
        apply_environment(&payload.environment);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkerFailure::Runtime)?;
        let mut postgres = PostgreSQL::new(settings);
        runtime.block_on(async {
            match step {
                Step::Setup => {
                    postgres.setup().await.map_err(|err| failed("setup", &err))?;
                    start_if_stopped(&mut postgres).await
                }
                Step::Start => start_if_stopped(&mut postgres).await,
                Step::Stop => postgres.stop().await.map_err(|err| failed("stop", &err)),
            }
        })?;
        if step == Step::Start {
            // Dropping the handle would stop the server.
            let _running = ManuallyDrop::new(postgres);
        }
        Ok(())
    }

    fn read_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerFailure> {
        let read = || -> Result<Vec<u8>, super::BoxError> {
            let (dir, relative) = ambient_dir_and_path(path)?;
            let mut bytes = Vec::new();
            dir.open(relative.as_std_path())?.read_to_end(&mut bytes)?;
            Ok(bytes)
        };
        let bytes = read().map_err(|source| WorkerFailure::PayloadRead {
            path: path.to_owned(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn demote_to_service_user() -> Result<(), WorkerFailure> {
        if !Uid::effective().is_root() {
            return Ok(());
        }
        let demotion = |err: nix::Error| WorkerFailure::Demotion(err.to_string());
        let user = User::from_name(SERVICE_USER)
            .map_err(demotion)?
            .ok_or_else(|| WorkerFailure::Demotion("account does not exist".to_owned()))?;
        let name = CString::new(user.name.clone())
            .map_err(|err| WorkerFailure::Demotion(err.to_string()))?;
        initgroups(&name, user.gid).map_err(demotion)?;
        setgid(user.gid).map_err(demotion)?;
        setuid(user.uid).map_err(demotion)?;

        // SAFETY: no other thread exists yet.
        unsafe {
            env::set_var("HOME", &user.dir);
            env::set_var("USER", &user.name);
            env::set_var("LOGNAME", &user.name);
        }
        Ok(())
    }

    fn apply_environment(overrides: &[(String, Option<PlainSecret>)]) {
        for (key, value) in overrides {
            // SAFETY: called before the runtime spawns any thread.
            unsafe {
                match value {
                    Some(secret) => env::set_var(key, secret.expose()),
                    None => env::remove_var(key),
                }
            }
        }
    }

    async fn start_if_stopped(postgres: &mut PostgreSQL) -> Result<(), WorkerFailure> {
        if matches!(postgres.status(), Status::Started) {
            return Ok(());
        }
        postgres.start().await.map_err(|err| failed("start", &err))
    }

    fn failed(step: &'static str, err: &postgresql_embedded::Error) -> WorkerFailure {
        WorkerFailure::Postgres {
            step,
            message: err.to_string(),
        }
    }

    /// Wraps `value` in single quotes for a POSIX shell.
    fn shell_quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', r"'\''"))
    }

}
