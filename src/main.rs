//! Host harness: loads the bootstrap `java/lang/Object` blob and a user
//! class file, then invokes `main`. The process exits when it returns.
use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use ristretto::runtime::Runtime;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: ristretto <classfile> [class-name]");
        return ExitCode::FAILURE;
    };
    let class_name = match args.get(2) {
        Some(name) => name.clone(),
        None => match Path::new(path).file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => {
                eprintln!("cannot derive a class name from `{path}`");
                return ExitCode::FAILURE;
            }
        },
    };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("{path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut vm = Runtime::new();
    if let Err(err) = vm.bootstrap() {
        eprintln!("bootstrap class failed to load: {err}");
        return ExitCode::FAILURE;
    }
    let class = match vm.load_class(&class_name, bytes) {
        Ok(class) => class,
        Err(err) => {
            eprintln!("{class_name}: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = vm.call(&class, "main") {
        eprintln!("{class_name}.main: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
