use crate::config::types::LoadError;
use crate::registry::model::{Subject, Trait};

/// Resolve the traits to run.
///
/// No names selects every trait. Otherwise every name must match at least one
/// trait exactly; matches are returned in registry order, each once. More
/// names than `limit` is refused outright rather than truncated.
pub fn select_traits<'s, S: AsRef<str>>(
    subject: &'s Subject,
    names: &[S],
    limit: usize,
) -> Result<Vec<&'s Trait>, LoadError> {
    if names.is_empty() {
        return Ok(subject.traits().iter().collect());
    }

    if names.len() > limit {
        return Err(LoadError::TooManyTraits {
            requested: names.len(),
            limit,
        });
    }

    if let Some(unknown) = names
        .iter()
        .map(AsRef::as_ref)
        .find(|name| !subject.traits().iter().any(|t| t.name() == *name))
    {
        return Err(LoadError::UnknownTrait(unknown.to_string()));
    }

    let selected: Vec<&Trait> = subject
        .traits()
        .iter()
        .filter(|t| names.iter().any(|name| name.as_ref() == t.name()))
        .collect();

    log::debug!(
        "Selected {} of {} traits from {} name(s)",
        selected.len(),
        subject.traits().len(),
        names.len()
    );
    Ok(selected)
}
