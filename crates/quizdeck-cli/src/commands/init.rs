//! The `quizdeck init` command.

use std::path::Path;

use anyhow::{Context, Result};

use quizdeck_providers::config::STARTER_CONFIG;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("quizdeck.toml"), STARTER_CONFIG)?;
    write_if_missing(Path::new("questions.json"), SAMPLE_CORPUS)?;

    println!("\nNext steps:");
    println!("  1. Replace questions.json with your question bank");
    println!("  2. Run: quizdeck validate");
    println!("  3. Run: quizdeck quiz");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CORPUS: &str = r#"[
  {
    "id": "cm-001",
    "subject": "carbon-accounting",
    "stem": "Which scope covers emissions from purchased electricity?",
    "options": {"A": "Scope 1", "B": "Scope 2", "C": "Scope 3", "D": "Scope 4"},
    "answer": "B",
    "explanation": "Indirect emissions from purchased electricity, heat and steam are Scope 2."
  },
  {
    "id": "cm-002",
    "subject": "carbon-accounting",
    "stem": "Company-owned vehicle fuel combustion falls under which scope?",
    "options": {"A": "Scope 1", "B": "Scope 2", "C": "Scope 3"},
    "answer": "A",
    "explanation": "Direct emissions from owned or controlled sources are Scope 1."
  },
  {
    "id": "cm-003",
    "subject": "carbon-accounting",
    "stem": "Business travel on commercial airlines is reported as:",
    "options": {"A": "Scope 1", "B": "Scope 2", "C": "Scope 3"},
    "answer": "C",
    "explanation": "Business travel is Scope 3, category 6."
  },
  {
    "id": "cm-004",
    "subject": "climate-policy",
    "stem": "Which agreement set the goal of limiting warming to well below 2 degrees?",
    "options": {"A": "Kyoto Protocol", "B": "Paris Agreement", "C": "Montreal Protocol", "D": "Doha Amendment"},
    "answer": "B",
    "explanation": "The Paris Agreement (2015) sets the well-below-2-degree goal."
  },
  {
    "id": "cm-005",
    "subject": "climate-policy",
    "stem": "An emissions trading system caps total emissions and allows:",
    "options": {"A": "Trading of allowances", "B": "Unlimited offsets", "C": "Tax exemptions"},
    "answer": "A",
    "explanation": "Cap-and-trade lets participants buy and sell allowances under a fixed cap."
  },
  {
    "id": "cm-006",
    "subject": "climate-policy",
    "stem": "Which gas has the highest global warming potential over 100 years?",
    "options": {"A": "Carbon dioxide", "B": "Methane", "C": "Sulfur hexafluoride", "D": "Nitrous oxide"},
    "answer": "C",
    "explanation": "SF6 has a 100-year GWP of roughly 23,500."
  },
  {
    "id": "cm-007",
    "subject": "carbon-markets",
    "stem": "One carbon credit usually represents:",
    "options": {"A": "One tonne of CO2e", "B": "One kilogram of CO2", "C": "One tonne of carbon"},
    "answer": "A",
    "explanation": "Credits are denominated in tonnes of CO2 equivalent."
  },
  {
    "id": "cm-008",
    "subject": "carbon-markets",
    "stem": "Additionality means a project's reductions:",
    "options": {"A": "Would have happened anyway", "B": "Would not have happened without carbon finance", "C": "Are permanent"},
    "answer": "B"
  },
  {
    "id": "cm-009",
    "subject": "carbon-markets",
    "stem": "Which registry is commonly used for voluntary carbon credits?",
    "options": {"A": "Verra", "B": "EDGAR", "C": "IPCC"},
    "answer": null,
    "explanation": "Practice question: Verra and Gold Standard are the largest voluntary registries."
  },
  {
    "id": "cm-010",
    "subject": "carbon-accounting",
    "stem": "The GHG Protocol Corporate Standard requires reporting of:",
    "options": {"A": "Scope 1 only", "B": "Scopes 1 and 2", "C": "Scopes 1, 2 and 3"},
    "answer": "B",
    "explanation": "Scopes 1 and 2 are mandatory; Scope 3 is optional under the Corporate Standard."
  }
]
"#;
