/*
 * Copyright 2023 Aon Cyber Solutions
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::{App, Arg};
use credhive::err::Error;
use credhive::scanner;
use std::fs::File;
use std::io::{self, BufWriter, Write};

fn main() -> Result<(), Error> {
    let matches = App::new("CredHive Hash Dump")
        .version("0.1")
        .about("Recovers local account password hashes from exported SAM/SYSTEM hives")
        .arg(
            Arg::with_name("sam")
                .short("s")
                .long("sam")
                .value_name("FILE")
                .help("Exported SAM hive file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("system")
                .short("y")
                .long("system")
                .value_name("FILE")
                .help("Exported SYSTEM hive file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Output file (stdout when omitted)")
                .takes_value(true),
        )
        .get_matches();

    let sam = matches.value_of("sam").expect("Required value");
    let system = matches.value_of("system").expect("Required value");

    let report = scanner::scan_paths(sam, system)?;

    let output: Box<dyn Write> = match matches.value_of("output") {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let mut writer = BufWriter::new(output);
    for user in &report.users {
        writeln!(&mut writer, "{}", serde_json::to_string(user)?)?;
    }
    writer.flush()?;

    // skipped-user diagnostics go to stderr, away from the jsonl stream
    report.logs.write(io::stderr())?;
    Ok(())
}
