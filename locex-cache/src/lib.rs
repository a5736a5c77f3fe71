mod cache;

pub use cache::{degree_label, intern_label, label_atom, label_count, label_text, Atom, LabelId};
