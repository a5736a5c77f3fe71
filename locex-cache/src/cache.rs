use lazy_static::lazy_static;
use std::sync::{PoisonError, RwLock};
pub use string_cache::DefaultAtom as Atom;

lazy_static! {
    static ref LABELS: RwLock<Vec<Atom>> = RwLock::new(Vec::new());
}

/// Stable handle to an interned stage label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(usize);

impl LabelId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Intern a label and return its id. Interning the same text twice yields
/// the same id.
pub fn intern_label(s: &str) -> LabelId {
    let atom = Atom::from(s);
    if let Some(idx) = LABELS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .position(|a| *a == atom)
    {
        return LabelId(idx);
    }

    let mut labels = LABELS.write().unwrap_or_else(PoisonError::into_inner);
    // another thread may have won the race between the two locks
    match labels.iter().position(|a| *a == atom) {
        Some(idx) => LabelId(idx),
        None => {
            labels.push(atom);
            LabelId(labels.len() - 1)
        }
    }
}

pub fn label_count() -> usize {
    LABELS.read().unwrap_or_else(PoisonError::into_inner).len()
}

pub fn label_atom(id: LabelId) -> Option<Atom> {
    LABELS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id.0)
        .cloned()
}

pub fn label_text(id: LabelId) -> Option<String> {
    label_atom(id).map(|a| a.to_string())
}

/// Label for an azimuth tick on the stage equator, e.g. `"30°"`.
pub fn degree_label(degrees: f32) -> LabelId {
    intern_label(&format!("{}°", degrees.round() as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let a = intern_label("Progress");
        let b = intern_label("Progress");
        assert_eq!(a, b);
        assert_eq!(label_text(a).as_deref(), Some("Progress"));
        assert!(label_count() > a.index());
    }

    #[test]
    fn degree_labels_round() {
        let id = degree_label(29.6);
        assert_eq!(label_text(id).as_deref(), Some("30°"));
        assert_eq!(degree_label(30.0), id);
    }
}
