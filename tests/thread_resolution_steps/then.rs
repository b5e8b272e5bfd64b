//! Then steps for thread resolution BDD scenarios.

use super::world::{ThreadWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::then;
use thread_bridge::mapping::{
    domain::ContextValidationError,
    ports::{MappingStore, ResolutionError},
};

#[then(r#""{first}" and "{second}" resolve to the same thread"#)]
fn same_thread(world: &ThreadWorld, first: String, second: String) -> Result<(), eyre::Report> {
    let left = world.thread_for(&first)?;
    let right = world.thread_for(&second)?;
    if left != right {
        return Err(eyre::eyre!(
            "expected one thread, got {} and {}",
            left.as_str(),
            right.as_str()
        ));
    }
    Ok(())
}

#[then(r#""{first}" and "{second}" resolve to different threads"#)]
fn different_threads(
    world: &ThreadWorld,
    first: String,
    second: String,
) -> Result<(), eyre::Report> {
    let left = world.thread_for(&first)?;
    let right = world.thread_for(&second)?;
    if left == right {
        return Err(eyre::eyre!("both resolved to {}", left.as_str()));
    }
    Ok(())
}

#[then(r#""{label}" resolves to thread "{expected}""#)]
fn resolves_to(world: &ThreadWorld, label: String, expected: String) -> Result<(), eyre::Report> {
    let actual = world.thread_for(&label)?;
    if actual.as_str() != expected {
        return Err(eyre::eyre!(
            "expected thread {expected}, got {}",
            actual.as_str()
        ));
    }
    Ok(())
}

#[then("resolution fails with a missing tenant error")]
fn fails_with_missing_tenant(world: &ThreadWorld) -> Result<(), eyre::Report> {
    let failure = world
        .last_failure
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing resolution failure in scenario world"))?;
    if !matches!(
        failure,
        ResolutionError::Validation(ContextValidationError::MissingTenant)
    ) {
        return Err(eyre::eyre!("expected missing tenant error, got {failure:?}"));
    }
    Ok(())
}

#[then("the last resolution resumed an existing mapping")]
fn last_resolution_resumed(world: &ThreadWorld) -> Result<(), eyre::Report> {
    let resolution = world
        .last_resolution
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no resolution recorded"))?;
    if resolution.is_new() {
        return Err(eyre::eyre!("expected an existing mapping to be resumed"));
    }
    Ok(())
}

#[then(r#"the mapping for "{label}" was last active {hours:i64} hours after creation"#)]
fn last_active_after_creation(
    world: &ThreadWorld,
    label: String,
    hours: i64,
) -> Result<(), eyre::Report> {
    let thread_id = world.thread_for(&label)?;
    let mapping = run_async(world.store.get_by_thread_id(thread_id))
        .wrap_err("look up mapping")?
        .ok_or_else(|| eyre::eyre!("no mapping stored for '{label}'"))?;
    let idle = mapping.last_activity_at() - mapping.created_at();
    if idle != chrono::Duration::hours(hours) {
        return Err(eyre::eyre!(
            "expected {hours}h between creation and last activity, got {idle}"
        ));
    }
    Ok(())
}

#[then(r#"the thread for "{label}" maps back to conversation "{conversation}""#)]
fn maps_back(world: &ThreadWorld, label: String, conversation: String) -> Result<(), eyre::Report> {
    let thread_id = world.thread_for(&label)?;
    let context = run_async(world.service()?.conversation_context(thread_id))
        .wrap_err("reverse lookup")?
        .ok_or_else(|| eyre::eyre!("no conversation recorded for '{label}'"))?;
    if context.channel_conversation_id().as_str() != conversation {
        return Err(eyre::eyre!(
            "expected conversation {conversation}, got {}",
            context.channel_conversation_id().as_str()
        ));
    }
    Ok(())
}

#[then("the sweep reports {count:u64} deleted")]
fn sweep_reports_deleted(world: &ThreadWorld, count: u64) -> Result<(), eyre::Report> {
    let report = world
        .sweep_report
        .ok_or_else(|| eyre::eyre!("no sweep report in scenario world"))?;
    if report.deleted != count {
        return Err(eyre::eyre!(
            "expected {count} deletions, got {}",
            report.deleted
        ));
    }
    Ok(())
}

#[then(r#"the thread for "{label}" no longer exists"#)]
fn thread_no_longer_exists(world: &ThreadWorld, label: String) -> Result<(), eyre::Report> {
    let thread_id = world.thread_for(&label)?;
    let found = run_async(world.store.get_by_thread_id(thread_id)).wrap_err("look up mapping")?;
    if found.is_some() {
        return Err(eyre::eyre!("expected '{label}' to be swept"));
    }
    Ok(())
}

#[then(r#"the thread for "{label}" still exists"#)]
fn thread_still_exists(world: &ThreadWorld, label: String) -> Result<(), eyre::Report> {
    let thread_id = world.thread_for(&label)?;
    let found = run_async(world.store.get_by_thread_id(thread_id)).wrap_err("look up mapping")?;
    if found.is_none() {
        return Err(eyre::eyre!("expected '{label}' to survive the sweep"));
    }
    Ok(())
}
