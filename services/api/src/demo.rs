use crate::infra::{seeded_service, PortalService};
use chrono::{Local, NaiveDate};
use clap::Args;
use partner_cabinet::clock::FixedClock;
use partner_cabinet::config::PortalConfig;
use partner_cabinet::error::AppError;
use partner_cabinet::integrations::crm::{ActivationOutcome, CrmSettings, ResponseMode};
use partner_cabinet::workflows::contract::{
    ActivationResult, ConsentFlow, CorporateTerms, DraftCommand, DraftView, RegistryStep,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Operator who drafts the contract
    #[arg(long, default_value = "operator1@silkroad.kz")]
    pub(crate) email: String,
    /// Product to insure (travel or mandatory)
    #[arg(long, default_value = "travel")]
    pub(crate) product: String,
    /// Destination territory code; repeat for several
    #[arg(long = "territory", default_values_t = vec!["TR".to_string()])]
    pub(crate) territories: Vec<String>,
    /// Insured person IIN; repeat for several
    #[arg(long = "iin", default_values_t = vec!["850315300123".to_string()])]
    pub(crate) iins: Vec<String>,
    /// Insurance period in days, counted inclusively from tomorrow
    #[arg(long, default_value_t = 7)]
    pub(crate) days: i64,
    /// Simulated CRM behaviour: auto, ok or fail
    #[arg(long, default_value = "ok", value_parser = parse_mode)]
    pub(crate) crm_mode: ResponseMode,
    /// Simulated CRM and SMS latency in milliseconds
    #[arg(long, default_value_t = 0)]
    pub(crate) latency_ms: u64,
    /// Apply a fully populated 100% corporate discount, which waives SMS consent
    #[arg(long)]
    pub(crate) corporate: bool,
    /// Seed for every simulated random draw
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Business date of the session (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

fn parse_mode(raw: &str) -> Result<ResponseMode, String> {
    ResponseMode::parse(raw).ok_or_else(|| format!("unknown CRM mode '{raw}', use auto, ok or fail"))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let portal = PortalConfig {
        consent_latency: Duration::from_millis(args.latency_ms),
        rng_seed: args.seed,
        ..PortalConfig::default()
    };
    let crm = CrmSettings {
        mode: args.crm_mode,
        latency_ms: args.latency_ms,
        ..CrmSettings::default()
    };
    let service = seeded_service(Arc::new(FixedClock::new(today)), portal, crm);

    println!("Partner cabinet demo ({today}, CRM mode {})", args.crm_mode.label());
    let session = service.login(&args.email)?;
    if let Some(user) = &session.user {
        println!(
            "- Signed in as {} ({})",
            user.email,
            session.role_name.as_deref().unwrap_or("no role")
        );
    }

    let view = draft_contract(&service, &args)?;
    println!(
        "- Draft {} for {} | {} -> {} ({} days)",
        view.draft.id,
        args.product,
        view.draft.start_date,
        view.draft.end_date,
        view.day_count
    );
    if let Some(hint) = &view.country_rule_hint {
        println!("  Country rule: {hint}");
    }
    for notice in &view.notices {
        println!("  Notice: {notice}");
    }

    for iin in &args.iins {
        let outcome = service.add_iin_person(iin).await?;
        println!("- IIN {iin}: {}", describe_flow(&outcome.flow));
    }

    let view = service.current_draft()?;
    render_premium(&view);
    if !view.can_activate {
        println!("\nActivation blocked:");
        for blocker in &view.blockers {
            println!("  - {}", blocker.message());
        }
        return Ok(());
    }

    let result = service.activate().await?;
    render_activation(&result);

    println!("\nRecent audit trail");
    for event in service.recent_audit(8)? {
        println!(
            "- {} {} {}",
            event.timestamp.format("%H:%M:%S"),
            event.action.label(),
            event.detail
        );
    }

    Ok(())
}

fn draft_contract(service: &PortalService, args: &DemoArgs) -> Result<DraftView, AppError> {
    service.start_draft()?;
    service.apply(DraftCommand::SelectProduct {
        product: args.product.clone(),
    })?;
    for code in &args.territories {
        service.apply(DraftCommand::AddTerritory { code: code.clone() })?;
    }
    let mut view = service.apply(DraftCommand::SetDays { days: args.days })?;
    if args.corporate {
        view = service.apply(DraftCommand::SetCorporateTerms {
            terms: CorporateTerms {
                client_company: "KazMunayGas".to_string(),
                discount_percent: Some(100.0),
                dms_number: "DMS-DEMO-0001".to_string(),
                ..CorporateTerms::default()
            },
        })?;
    }
    Ok(view)
}

fn describe_flow(flow: &ConsentFlow) -> String {
    match flow {
        ConsentFlow::LookupComplete {
            bypassed, lookup, ..
        } => {
            let person = &lookup.person;
            let consent = if *bypassed {
                "consent waived"
            } else {
                "consent confirmed"
            };
            format!(
                "{} {} (born {}), {consent}",
                person.last_name, person.first_name, person.birth_date
            )
        }
        ConsentFlow::Cancelled { reason, .. } => format!("cancelled ({reason:?})"),
        ConsentFlow::ConsentPending { .. } => "waiting for consent".to_string(),
        ConsentFlow::ConsentConfirmed { .. } => "consent confirmed, lookup pending".to_string(),
    }
}

fn render_premium(view: &DraftView) {
    println!("\nPremium: {} KZT", view.premium.total);
    for (person, share) in view.draft.persons.iter().zip(&view.premium.per_person) {
        println!("  - {}: {share} KZT", person.full_name());
    }
}

fn render_activation(result: &ActivationResult) {
    println!("\nActivation");
    match &result.outcome {
        ActivationOutcome::Activated(receipt) => {
            println!(
                "- Policy {} issued (CRM id {})",
                receipt.policy_number, receipt.crm_id
            );
            println!("- Document: {}", receipt.pdf_link);
        }
        ActivationOutcome::Rejected(rejection) => {
            println!("- Rejected {}: {}", rejection.code, rejection.title);
            println!("  {}", rejection.description);
        }
    }
    let registry = match result.registry {
        RegistryStep::Submitted => "submitted",
        RegistryStep::Skipped => "skipped (zero premium)",
        RegistryStep::NotApplicable => "not applicable",
    };
    println!(
        "- Contract {} is {} | registry {registry}",
        result.record.id,
        result.record.status.label()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        demo: DemoArgs,
    }

    #[test]
    fn defaults_describe_the_reference_trip() {
        let Harness { demo } = Harness::parse_from(["demo"]);

        assert_eq!(demo.product, "travel");
        assert_eq!(demo.territories, vec!["TR".to_string()]);
        assert_eq!(demo.iins, vec!["850315300123".to_string()]);
        assert_eq!(demo.crm_mode, ResponseMode::ForcedSuccess);
        assert_eq!(demo.days, 7);
    }

    #[test]
    fn crm_mode_rejects_unknown_values() {
        assert_eq!(parse_mode("FAIL"), Ok(ResponseMode::ForcedFailure));
        assert!(parse_mode("sometimes").is_err());
    }

    #[tokio::test]
    async fn demo_runs_to_activation() {
        let Harness { demo } = Harness::parse_from([
            "demo",
            "--today",
            "2026-03-02",
            "--seed",
            "5",
            "--iin",
            "850315300123",
            "--iin",
            "900722400234",
        ]);

        run_demo(demo).await.expect("demo completes");
    }
}
