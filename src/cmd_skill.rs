use crate::args::SkillCommands;
use anyhow::Result;
use skillhost::clienv;
use skillhost::manifest::discover_manifests;
use skillhost::DependencyResolver;

pub async fn cmd_skill(command: SkillCommands) -> Result<()> {
    match command {
        SkillCommands::List => cmd_skill_list(),
        SkillCommands::Order => cmd_skill_order(),
    }
}

fn cmd_skill_list() -> Result<()> {
    let skills_dir = clienv::skills_dir();
    let manifests = discover_manifests(&skills_dir)?;

    if manifests.is_empty() {
        println!("No skills installed in {}", skills_dir.display());
        return Ok(());
    }

    println!("Installed skills ({}):", manifests.len());
    for manifest in &manifests {
        let requires = manifest
            .requires
            .entries()
            .iter()
            .map(|(name, constraint)| match constraint {
                Some(c) => format!("{name} {c}"),
                None => name.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        if requires.is_empty() {
            println!("  {} v{}", manifest.name, manifest.version);
        } else {
            println!(
                "  {} v{} (requires: {requires})",
                manifest.name, manifest.version
            );
        }
    }
    Ok(())
}

fn cmd_skill_order() -> Result<()> {
    let skills_dir = clienv::skills_dir();
    let manifests = discover_manifests(&skills_dir)?;

    if manifests.is_empty() {
        println!("No skills installed in {}", skills_dir.display());
        return Ok(());
    }

    let mut order = DependencyResolver::resolve(&manifests)?;
    order.reverse();

    println!("Activation order:");
    for (i, name) in order.iter().enumerate() {
        println!("  {}. {name}", i + 1);
    }
    Ok(())
}
