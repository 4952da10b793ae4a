//! The two descriptor dialects, expressed as legal-transition tables over
//! one shared parser state machine.
//!
//! The "site" dialect covers classic `site.xml`; the "category" dialect
//! additionally understands `iu` queries, repository references and stats
//! tracking. Both share the element set for features, bundles, archives and
//! category definitions.

use crate::site::parser::ParserState;

/// Grammar of one descriptor dialect: its root element plus the pure
/// `(state, element) -> state` dispatch table.
///
/// Implementations carry no parsing logic; the parser engine owns the
/// stacks and handlers and consults the grammar for legality only.
pub trait DialectGrammar: Send + Sync {
    /// Short dialect name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// The only element accepted at document start.
    fn root_element(&self) -> &'static str;

    /// Returns the state entered by `element` in `state`, or `None` when
    /// the element is not legal there.
    fn transition(&self, state: ParserState, element: &str) -> Option<ParserState>;
}

/// Transitions shared by both dialects.
fn base_transition(state: ParserState, element: &str) -> Option<ParserState> {
    use ParserState::*;
    match (state, element) {
        (Site, "description") => Some(DescriptionOfSite),
        (CategoryDef, "description") => Some(DescriptionOfCategoryDef),

        // The historical grammar accepts these under the root, under
        // descriptions and under category definitions alike.
        (Site | DescriptionOfSite | DescriptionOfCategoryDef | CategoryDef, "feature") => {
            Some(Feature)
        }
        (Site | DescriptionOfSite | DescriptionOfCategoryDef | CategoryDef, "bundle") => {
            Some(Bundle)
        }
        (Site | DescriptionOfSite | DescriptionOfCategoryDef | CategoryDef, "archive") => {
            Some(Archive)
        }
        (Site | DescriptionOfSite | DescriptionOfCategoryDef | CategoryDef, "category-def") => {
            Some(CategoryDef)
        }

        (Feature, "category") => Some(Category),
        (Bundle, "category") => Some(Category),

        _ => None,
    }
}

/// Grammar of the classic `site.xml` dialect.
pub struct UpdateSiteDialect;

impl DialectGrammar for UpdateSiteDialect {
    fn name(&self) -> &'static str {
        "site"
    }

    fn root_element(&self) -> &'static str {
        "site"
    }

    fn transition(&self, state: ParserState, element: &str) -> Option<ParserState> {
        base_transition(state, element)
    }
}

/// Grammar of the richer `category.xml` dialect.
pub struct CategoryDialect;

impl DialectGrammar for CategoryDialect {
    fn name(&self) -> &'static str {
        "category"
    }

    fn root_element(&self) -> &'static str {
        "site"
    }

    fn transition(&self, state: ParserState, element: &str) -> Option<ParserState> {
        use ParserState::*;
        match (state, element) {
            (Site, "iu") => Some(Unit),
            (Site, "repository-reference") => Some(RepositoryRef),
            (Site, "stats") => Some(Stats),

            (Unit, "category") => Some(Category),
            (Unit, "query") => Some(Query),
            (Query, "expression") => Some(Expression),
            (Query, "param") => Some(Param),

            (Stats, "feature") => Some(Feature),
            (Stats, "bundle") => Some(Bundle),

            // Nested categories: a definition may name the categories it
            // is nested inside.
            (CategoryDef, "category") => Some(Category),

            _ => base_transition(state, element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::parser::ParserState;

    #[test]
    fn test_shared_elements() {
        for dialect in [&UpdateSiteDialect as &dyn DialectGrammar, &CategoryDialect] {
            assert_eq!(
                dialect.transition(ParserState::Site, "feature"),
                Some(ParserState::Feature)
            );
            assert_eq!(
                dialect.transition(ParserState::Site, "category-def"),
                Some(ParserState::CategoryDef)
            );
            assert_eq!(
                dialect.transition(ParserState::Feature, "category"),
                Some(ParserState::Category)
            );
            assert_eq!(dialect.transition(ParserState::Site, "nonsense"), None);
        }
    }

    #[test]
    fn test_category_only_elements() {
        let site = UpdateSiteDialect;
        let category = CategoryDialect;

        assert_eq!(site.transition(ParserState::Site, "iu"), None);
        assert_eq!(
            category.transition(ParserState::Site, "iu"),
            Some(ParserState::Unit)
        );

        assert_eq!(site.transition(ParserState::Site, "repository-reference"), None);
        assert_eq!(
            category.transition(ParserState::Site, "repository-reference"),
            Some(ParserState::RepositoryRef)
        );

        assert_eq!(site.transition(ParserState::Site, "stats"), None);
        assert_eq!(
            category.transition(ParserState::Stats, "feature"),
            Some(ParserState::Feature)
        );

        assert_eq!(site.transition(ParserState::CategoryDef, "category"), None);
        assert_eq!(
            category.transition(ParserState::CategoryDef, "category"),
            Some(ParserState::Category)
        );
    }

    #[test]
    fn test_query_chain() {
        let category = CategoryDialect;
        assert_eq!(
            category.transition(ParserState::Unit, "query"),
            Some(ParserState::Query)
        );
        assert_eq!(
            category.transition(ParserState::Query, "expression"),
            Some(ParserState::Expression)
        );
        assert_eq!(
            category.transition(ParserState::Query, "param"),
            Some(ParserState::Param)
        );
    }
}
