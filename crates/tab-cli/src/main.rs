//! Command-line front end: flag parsing, input selection and error
//! reporting. Everything interesting happens in the `tab` crate.

use std::{
    env,
    fs::File,
    io::{self, BufReader},
    process::ExitCode,
    time::{SystemTime, UNIX_EPOCH},
};

use tab::Options;

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [-s] [-t N] [-r SEED] [-d LEVEL] [-h TOPIC] <expression> [input-file]

  -s        print map entries sorted by key
  -t N      use N scatter threads (default 1)
  -r SEED   seed the random number generator
  -d LEVEL  dump the parsed (1) and typed (2) command stream to stderr
  -h TOPIC  print a help topic and exit; '-h help' lists topics

If no input file is given, standard input is read."
    )
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("tab", String::as_str);

    let mut opts = Options {
        seed: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs()),
        ..Options::default()
    };
    let mut positional: Vec<&str> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-s" => opts.sorted = true,
            "-t" | "-r" | "-d" | "-h" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("ERROR: {arg} needs an argument");
                    return ExitCode::FAILURE;
                };
                match arg {
                    "-t" => match value.parse::<usize>() {
                        Ok(n) => opts.threads = n,
                        Err(_) => {
                            eprintln!("ERROR: invalid thread count: {value}");
                            return ExitCode::FAILURE;
                        }
                    },
                    "-r" => match value.parse::<u64>() {
                        Ok(n) => opts.seed = n,
                        Err(_) => {
                            eprintln!("ERROR: invalid seed: {value}");
                            return ExitCode::FAILURE;
                        }
                    },
                    "-d" => match value.parse::<u8>() {
                        Ok(n) => opts.debug = n,
                        Err(_) => {
                            eprintln!("ERROR: invalid debug level: {value}");
                            return ExitCode::FAILURE;
                        }
                    },
                    _ => return print_help(value),
                }
            }
            _ => positional.push(arg),
        }
        i += 1;
    }

    let (expression, input_file) = match positional.as_slice() {
        [expr] => (*expr, None),
        [expr, file] => (*expr, Some(*file)),
        _ => {
            eprintln!("{}", usage(program));
            return ExitCode::FAILURE;
        }
    };

    let result = match input_file {
        Some(path) => match File::open(path) {
            Ok(file) => tab::run(expression, BufReader::new(file), &mut io::stdout(), &opts),
            Err(e) => Err(tab::Error::Io(e)),
        },
        None => tab::run(
            expression,
            BufReader::new(io::stdin()),
            &mut io::stdout(),
            &opts,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help(topic: &str) -> ExitCode {
    if topic == "functions" {
        for name in tab::help::function_names() {
            println!("{name}");
        }
    } else if let Some(text) = tab::help::topic(topic) {
        println!("{text}");
    } else {
        println!("Help topics:\n");
        for t in tab::help::topics() {
            println!("  {t}");
        }
    }
    ExitCode::SUCCESS
}
