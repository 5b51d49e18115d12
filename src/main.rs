//-
// Copyright (c) 2016, Jason Lingle
//
// This file is part of PGPWrap.
//
// PGPWrap is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// PGPWrap is distributed  in the hope that  it will be useful,  but WITHOUT
// ANY WARRANTY; without even the implied  warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// PGPWrap. If not, see <http://www.gnu.org/licenses/>.

use std::env;
use std::io::{Read, Write, stdin, stdout, stderr};
use std::process::exit;

use getopts::Options;
use tracing::{debug,error,warn};
use tracing_subscriber::EnvFilter;

mod crypt;
mod error;
mod mime;
mod pipe;
mod policy;
mod wrap;

use crate::error::{EX_USAGE,Result};
use crate::pipe::{FailurePolicy,Mode,Pipeline,Settings};

const PASSPHRASE_ENV : &'static str = "PGPWRAP_PASSPHRASE";

/// Everything the command line selects.
#[derive(Clone,Debug)]
struct Config {
    mode: Mode,
    gnupghome: Option<String>,
    verbosity: usize,
    settings: Settings,
}

fn options() -> Options {
    let mut opts = Options::new();
    opts.optflag("s", "sign", "sign the message");
    opts.optflag("e", "encrypt", "encrypt the message to the recipients");
    opts.optflag("d", "decrypt", "decrypt the message");
    opts.optopt("", "gnupghome", "use DIR as the GnuPG home directory", "DIR");
    opts.optopt("k", "key", "sign with KEYID instead of the default key",
                "KEYID");
    opts.optopt("p", "passphrase",
                "passphrase for the secret key (default: $PGPWRAP_PASSPHRASE)",
                "PASS");
    opts.optflag("", "encrypt-subject",
                 "replace the visible Subject of encrypted messages");
    opts.optflag("", "fail-closed",
                 "exit with an error instead of passing the message through \
                  when GPG fails");
    opts.optflagmulti("v", "verbose", "log more; may be repeated");
    opts.optflag("h", "help", "print this help menu");
    opts
}

/// Interprets the command line. `Ok(None)` means help was requested.
fn parse_config(opts: &Options, args: &[String],
                env_passphrase: Option<String>)
                -> std::result::Result<Option<Config>, String> {
    let matches = opts.parse(args).map_err(|f| f.to_string())?;
    if matches.opt_present("h") {
        return Ok(None);
    }

    let sign = matches.opt_present("s");
    let encrypt = matches.opt_present("e");
    let decrypt = matches.opt_present("d");
    let mode = match (sign, encrypt, decrypt) {
        (true, false, false) => Mode::Sign,
        (false, true, false) => Mode::Encrypt,
        (true, true, false) => Mode::SignEncrypt,
        (false, false, true) => Mode::Decrypt,
        (false, false, false) =>
            return Err("One of -s, -e or -d is required.".to_owned()),
        _ => return Err("-d cannot be combined with -s or -e.".to_owned()),
    };

    let recipients = matches.free.clone();
    if encrypt && recipients.is_empty() {
        return Err("No recipients given.".to_owned());
    }

    Ok(Some(Config {
        mode: mode,
        gnupghome: matches.opt_str("gnupghome"),
        verbosity: matches.opt_count("v"),
        settings: Settings {
            key: matches.opt_str("k"),
            passphrase: matches.opt_str("p").or(env_passphrase),
            recipients: recipients,
            encrypt_subject: matches.opt_present("encrypt-subject"),
            failure_policy: if matches.opt_present("fail-closed") {
                FailurePolicy::Closed
            } else {
                FailurePolicy::Open
            },
        },
    }))
}

fn init_logging(verbosity: usize) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .init();
}

fn print_usage<W : Write>(mut dst: W, program: &str, opts: &Options) {
    let brief = format!("Usage: {} (-s | -e | -s -e | -d) [options] \
                         [recipient ...]", program);
    let _ = write!(dst, "{}", opts.usage(&brief));
}

fn main() {
    let args: Vec<_> = env::args().collect();
    let program = args.get(0).cloned().unwrap_or_else(|| "pgpwrap".to_owned());
    let opts = options();

    let rest: &[String] = args.get(1..).unwrap_or(&[]);

    let config = match parse_config(&opts, rest,
                                    env::var(PASSPHRASE_ENV).ok()) {
        Ok(Some(config)) => config,
        Ok(None) => {
            print_usage(stdout(), &program, &opts);
            exit(0);
        },
        Err(message) => {
            let _ = writeln!(stderr(), "Invalid usage: {}", message);
            print_usage(stderr(), &program, &opts);
            exit(EX_USAGE);
        },
    };

    init_logging(config.verbosity);

    if let Err(err) = run(config) {
        error!(%err, "giving up");
        exit(err.exit_code());
    }
}

fn run(config: Config) -> Result<()> {
    let mut input = Vec::new();
    stdin().read_to_end(&mut input)?;
    debug!(bytes = input.len(), mode = ?config.mode, "read message");

    let engine = crypt::GpgEngine::new(
        config.gnupghome.as_ref().map(|h| &h[..]))?;
    let policy = config.settings.failure_policy;
    let mut pipeline = Pipeline::new(engine, mime::UuidSeparatorGen,
                                     config.settings);

    let outcome = pipeline.process(config.mode, &input)?;
    if outcome.is_failed() && FailurePolicy::Open == policy {
        warn!("emitting the original message unchanged");
    }
    let output = outcome.into_output(policy)?;
    let out = stdout();
    let mut out = out.lock();
    out.write_all(&output)?;
    out.flush()?;
    Ok(())
}
