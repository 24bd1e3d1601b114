use game_night_back::services::documentation::api_doc;

fn main() -> anyhow::Result<()> {
    println!("{}", api_doc().to_pretty_json()?);
    Ok(())
}
