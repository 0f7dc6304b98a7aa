//! 組み込みのタスク種別

pub mod flashcards;
pub mod subject_classification;

pub use self::flashcards::{Flashcard, FlashcardSet, Flashcards};
pub use self::subject_classification::{SubjectClassification, SubjectLabel};

use crate::typed::{RegistryError, TaskRegistry};

/// Registry holding every built-in task kind with its default parameters.
pub fn builtin_registry() -> Result<TaskRegistry, RegistryError> {
    let mut registry = TaskRegistry::new();
    registry.register(SubjectClassification::default())?;
    registry.register(Flashcards::default())?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_both_tasks() {
        let registry = builtin_registry().unwrap();
        assert_eq!(
            registry.registered_types(),
            vec!["flashcards", "subject_classification"]
        );
    }
}
