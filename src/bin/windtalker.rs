//! Windtalker CLI - password-based encryption of text, files and directories
//!
//! Thin command-line front end over the library's symmetric cipher.

use clap::{Args, Parser, Subcommand};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use windtalker::passphrase::{
    FilePassphraseReader, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader,
};
use windtalker::{Cipher, FileOptions, Result, SymmetricCipher, WindtalkerError};

#[derive(Parser)]
#[command(name = "windtalker")]
#[command(version)]
#[command(about = "Encrypt and decrypt text, files and directories.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true, conflicts_with = "passphrase_file")]
    passphrase_stdin: bool,

    /// Read password from this file (surrounding whitespace is ignored)
    #[arg(long, global = true, value_name = "FILE")]
    passphrase_file: Option<PathBuf>,

    /// Report progress on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PathArgs {
    /// File or directory to process
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Where to write the result; derived from the input name when omitted
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Replace output files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Load each file whole instead of streaming it in chunks
    #[arg(long)]
    no_stream: bool,

    /// Plaintext bytes per encrypted chunk; decrypting needs the same value
    /// that was used for encrypting
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file or a directory tree
    #[command(alias = "e")]
    Encrypt(PathArgs),

    /// Decrypt a file or a directory tree
    #[command(alias = "d")]
    Decrypt(PathArgs),

    /// Encrypt a text and print it as base64
    EncryptText {
        /// Text to encrypt
        text: String,
    },

    /// Decrypt a base64 text produced by encrypt-text
    DecryptText {
        /// Text to decrypt
        text: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Encrypt(args) => {
            let cipher = open_session(cli, args.chunk_size)?;
            let options = file_options(cli, args);
            let output = if args.input.is_dir() {
                cipher.encrypt_dir(&args.input, args.output.as_deref(), &options)?
            } else {
                cipher.encrypt_file(&args.input, args.output.as_deref(), &options)?
            };
            print_written(&output);
        }
        Commands::Decrypt(args) => {
            let cipher = open_session(cli, args.chunk_size)?;
            let options = file_options(cli, args);
            let output = if args.input.is_dir() {
                cipher.decrypt_dir(&args.input, args.output.as_deref(), &options)?
            } else {
                cipher.decrypt_file(&args.input, args.output.as_deref(), &options)?
            };
            print_written(&output);
        }
        Commands::EncryptText { text } => {
            let cipher = open_session(cli, None)?;
            println!("{}", cipher.encrypt_text(text)?);
        }
        Commands::DecryptText { text } => {
            let cipher = open_session(cli, None)?;
            println!("{}", cipher.decrypt_text(text)?);
        }
    }
    Ok(())
}

fn open_session(cli: &Cli, chunk_size: Option<usize>) -> Result<SymmetricCipher> {
    let mut boxed = passphrase_reader(cli);
    let reader: &mut dyn PassphraseReader = &mut *boxed;
    let mut cipher = SymmetricCipher::from_reader(Some(reader))?;
    if let Some(size) = chunk_size {
        cipher.set_encrypt_chunk_size(size)?;
    }
    Ok(cipher)
}

fn passphrase_reader(cli: &Cli) -> Box<dyn PassphraseReader> {
    if cli.passphrase_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else if let Some(path) = &cli.passphrase_file {
        Box::new(FilePassphraseReader::new(path))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

fn file_options(cli: &Cli, args: &PathArgs) -> FileOptions {
    FileOptions::default()
        .overwrite(args.overwrite)
        .stream(!args.no_stream)
        .verbose(cli.verbose)
}

fn print_written(path: &Path) {
    println!("{}", path.display());
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Render an error followed by its chain of causes.
fn error_chain(err: &WindtalkerError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
