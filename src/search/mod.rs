use crate::model::Tag;

/// a matcher evaluated against a tracked file's tag set to decide inclusion in a
/// filtered view. Lists of predicates combine with AND semantics. Filtering always
/// happens in the application layer over retrieved rows; predicates are never
/// pushed down into SQL
#[derive(Debug, PartialEq, Clone)]
pub enum SearchPredicate {
    /// matches files holding a tag with this name and, unless `ignore_value`, this exact value
    Tagged { tag: Tag, ignore_value: bool },
}

impl SearchPredicate {
    /// matches the exact `(name, value)` pair
    pub fn tagged(tag: Tag) -> SearchPredicate {
        SearchPredicate::Tagged {
            tag,
            ignore_value: false,
        }
    }

    /// matches any tag with the same name, regardless of value
    pub fn tagged_any_value(tag: Tag) -> SearchPredicate {
        SearchPredicate::Tagged {
            tag,
            ignore_value: true,
        }
    }

    pub fn matches(&self, tags: &[Tag]) -> bool {
        match self {
            SearchPredicate::Tagged {
                tag,
                ignore_value: true,
            } => tags.iter().any(|candidate| candidate.name == tag.name),
            SearchPredicate::Tagged {
                tag,
                ignore_value: false,
            } => tags
                .iter()
                .any(|candidate| candidate.same_instance(tag)),
        }
    }

    /// true only when every predicate accepts the tag set
    pub fn matches_all(predicates: &[SearchPredicate], tags: &[Tag]) -> bool {
        predicates.iter().all(|predicate| predicate.matches(tags))
    }
}
