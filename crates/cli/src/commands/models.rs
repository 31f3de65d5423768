// Models listing command

use crate::output::OutputFormat;
use anyhow::Result;
use firstbyte_core::DEFAULT_MODELS;

pub fn run(output: OutputFormat) -> Result<()> {
    if output.is_text() {
        for model in DEFAULT_MODELS {
            println!("{}", model);
        }
        return Ok(());
    }

    output.print_value(&serde_json::json!({ "data": DEFAULT_MODELS, "total": DEFAULT_MODELS.len() }))
}
