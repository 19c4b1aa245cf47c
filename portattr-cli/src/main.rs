use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use portattr::{
    Namespace, NativeXattr, OperationConfig, Target, TruncationPolicy, XattrFlags, XattrOperations,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pxattr")]
#[command(about = "Get, set, delete and list user extended attributes")]
#[command(version, disable_help_flag = true)]
#[command(group(ArgGroup::new("mode").required(true).args(["name", "delete", "list"])))]
struct Cli {
    /// Attribute to print, or to set when combined with --value
    #[arg(short = 'n', long, value_name = "NAME")]
    name: Option<String>,

    /// Value to set
    #[arg(short = 'v', long, value_name = "VALUE", requires = "name")]
    value: Option<String>,

    /// Attribute to delete
    #[arg(short = 'x', long = "delete", value_name = "NAME")]
    delete: Option<String>,

    /// List every attribute with its value
    #[arg(short = 'l', long)]
    list: bool,

    /// Act on symbolic links instead of the files they point to
    #[arg(short = 'h', long = "no-dereference")]
    no_dereference: bool,

    /// What to do when an attribute grows while it is being read
    #[arg(long, value_name = "POLICY", default_value_t = TruncationPolicy::RetryOnce)]
    truncation: TruncationPolicy,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Files to operate on
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode<'a> {
    Set { name: &'a str, value: &'a str },
    Get { name: &'a str },
    Delete { name: &'a str },
    List,
}

impl Cli {
    fn mode(&self) -> Mode<'_> {
        match (self.name.as_deref(), self.value.as_deref(), self.delete.as_deref()) {
            (Some(name), Some(value), _) => Mode::Set { name, value },
            (Some(name), None, _) => Mode::Get { name },
            (None, _, Some(name)) => Mode::Delete { name },
            (None, _, None) => Mode::List,
        }
    }

    fn flags(&self) -> XattrFlags {
        XattrFlags {
            no_follow: self.no_dereference,
            ..XattrFlags::NONE
        }
    }
}

fn print_value(out: &mut impl Write, name: &str, value: &[u8]) -> io::Result<()> {
    writeln!(out, " {} => {}", name, String::from_utf8_lossy(value))
}

/// Applies the requested operation to every path, stopping at the first failure.
fn run<B: NativeXattr>(cli: &Cli, ops: &XattrOperations<B>, out: &mut impl Write) -> Result<()> {
    let flags = cli.flags();
    let mode = cli.mode();
    debug!("mode {:?} on {} paths", mode, cli.paths.len());

    for path in &cli.paths {
        let target = Target::Path(path.as_path());
        match mode {
            Mode::Set { name, value } => {
                ops.set(target, name, value.as_bytes(), flags, Namespace::User)
                    .context("pxattr::set")?;
            }
            Mode::Get { name } => {
                writeln!(out, "Path: {}", path.display())?;
                let value = ops.get(target, name, flags, Namespace::User).context("pxattr::get")?;
                print_value(out, name, &value)?;
            }
            Mode::Delete { name } => {
                ops.remove(target, name, flags, Namespace::User).context("pxattr::del")?;
            }
            Mode::List => {
                writeln!(out, "Path: {}", path.display())?;
                let names = ops.list(target, flags, Namespace::User).context("pxattr::list")?;
                for name in names {
                    let value = ops
                        .get(target, &name, flags, Namespace::User)
                        .context("pxattr::get")?;
                    print_value(out, &name, &value)?;
                }
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pxattr=warn,portattr_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = OperationConfig::new().with_truncation(cli.truncation);
    info!("native backend with {} truncation policy", config.truncation);

    let ops = portattr::platform_with_config(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match run(&cli, &ops, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Output printed so far goes out ahead of the error message.
            if let Err(flush_err) = out.flush() {
                warn!("flushing stdout failed: {}", flush_err);
            }
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portattr::{InMemoryBackend, XattrError};
    use std::path::Path;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pxattr").chain(args.iter().copied())).unwrap()
    }

    fn run_in_memory(
        ops: &XattrOperations<InMemoryBackend>,
        args: &[&str],
    ) -> (Result<()>, String) {
        let mut out = Vec::new();
        let result = run(&parse(args), ops, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_modes() {
        assert_eq!(
            parse(&["-n", "k", "-v", "v", "/a"]).mode(),
            Mode::Set { name: "k", value: "v" }
        );
        assert_eq!(parse(&["-n", "k", "/a", "/b"]).mode(), Mode::Get { name: "k" });
        assert_eq!(parse(&["-x", "k", "/a"]).mode(), Mode::Delete { name: "k" });
        assert_eq!(parse(&["-l", "/a"]).mode(), Mode::List);
        assert!(parse(&["-h", "-l", "/a"]).flags().no_follow);
    }

    #[test]
    fn test_usage_errors() {
        let cases: [&[&str]; 5] = [
            &["/a"],
            &["-l"],
            &["-l", "-x", "k", "/a"],
            &["-v", "v", "/a"],
            &["-n", "k", "-x", "k", "/a"],
        ];
        for args in cases {
            let argv = std::iter::once("pxattr").chain(args.iter().copied());
            assert!(Cli::try_parse_from(argv).is_err(), "{:?}", args);
        }
    }

    #[test]
    fn test_set_get_list_delete() {
        let ops = XattrOperations::new(InMemoryBackend::new());

        let (result, out) = run_in_memory(&ops, &["-n", "color", "-v", "blue", "/a", "/b"]);
        result.unwrap();
        assert!(out.is_empty());
        assert_eq!(ops.backend().raw_names(Path::new("/b")), vec!["user.color".to_string()]);

        let (result, out) = run_in_memory(&ops, &["-n", "color", "/a"]);
        result.unwrap();
        assert_eq!(out, "Path: /a\n color => blue\n");

        ops.backend().insert_raw("/a", "security.selinux", b"ctx");
        let (result, out) = run_in_memory(&ops, &["-l", "/a"]);
        result.unwrap();
        assert_eq!(out, "Path: /a\n color => blue\n");

        let (result, _) = run_in_memory(&ops, &["-x", "color", "/a"]);
        result.unwrap();
        let (result, out) = run_in_memory(&ops, &["-l", "/a"]);
        result.unwrap();
        assert_eq!(out, "Path: /a\n");
    }

    #[test]
    fn test_stops_at_first_failure() {
        let ops = XattrOperations::new(InMemoryBackend::new());
        ops.set(Path::new("/b"), "k", b"v", XattrFlags::NONE, Namespace::User).unwrap();

        let (result, out) = run_in_memory(&ops, &["-n", "k", "/a", "/b"]);
        let err = result.unwrap_err();
        let code = err.downcast_ref::<XattrError>().and_then(XattrError::raw_os_error).unwrap();
        let os_text = io::Error::from_raw_os_error(code).to_string();
        assert_eq!(format!("{:#}", err), format!("pxattr::get: get failed on /a: {}", os_text));
        assert_eq!(out, "Path: /a\n");
    }
}
