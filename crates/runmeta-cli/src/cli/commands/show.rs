use runmeta_core::{MetaConfig, MetadataDocument, METADATA_FILE_NAME};
use serde_json::Value;

use crate::cli::args::ShowArgs;
use crate::exit_codes;

pub fn run(args: ShowArgs) -> anyhow::Result<i32> {
    let dir = args
        .out_dir
        .unwrap_or_else(|| MetaConfig::from_env().out_dir().to_path_buf());
    let path = dir.join(METADATA_FILE_NAME);
    if !path.is_file() {
        eprintln!("no metadata at {}", path.display());
        return Ok(exit_codes::COMMAND_FAILED);
    }

    let doc = MetadataDocument::load(&path);
    match args.field {
        Some(field) => match doc.get(&field) {
            Some(Value::String(s)) => println!("{s}"),
            Some(value) => println!("{value}"),
            None => {
                eprintln!("field not set: {field}");
                return Ok(exit_codes::COMMAND_FAILED);
            }
        },
        None => print!("{}", doc.to_file_contents()),
    }
    Ok(exit_codes::SUCCESS)
}
