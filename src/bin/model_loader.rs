use anyhow::Result;
use lm_runner::app::container;
use lm_runner::format::human_number;
use lm_runner::logging;

fn main() -> Result<()> {
    logging::init();

    let (tokenizer, model) = container::load_model()?;
    let meta = model.meta();
    println!(
        "Loaded {} ({} parameters, {} tokens) on {:?}",
        meta.name,
        human_number(meta.parameter_count),
        tokenizer.vocab_size(),
        model.device()
    );
    Ok(())
}
