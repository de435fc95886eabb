//! Catalog walker
//!
//! Fetches programs, then each program's leaves one program at a time, and
//! flattens them into descriptors in source order. Any failure aborts the
//! walk: a catalog missing one program's leaves would produce a summary
//! that looks complete but is not.

use crate::api::CatalogApi;
use crate::error::PlannerError;
use crate::types::LeafDescriptor;

/// Result of one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogWalk {
    /// Programs returned by the root fetch
    pub program_count: usize,
    /// Flattened leaves, program order then leaf order
    pub descriptors: Vec<LeafDescriptor>,
}

impl CatalogWalk {
    /// No programs at all
    #[inline]
    #[must_use]
    pub fn has_no_programs(&self) -> bool {
        self.program_count == 0
    }
}

/// Two-level catalog walker
pub struct CatalogWalker<'a> {
    api: &'a dyn CatalogApi,
}

impl<'a> CatalogWalker<'a> {
    /// Create walker over a backend
    #[inline]
    #[must_use]
    pub fn new(api: &'a dyn CatalogApi) -> Self {
        Self { api }
    }

    /// Walk the catalog
    ///
    /// # Errors
    /// Propagates the first failure of the program list or of any leaf list
    pub async fn walk(&self) -> Result<CatalogWalk, PlannerError> {
        let programs = self.api.list_programs().await?;
        if programs.is_empty() {
            tracing::debug!("catalog has no programs");
            return Ok(CatalogWalk::default());
        }

        let mut descriptors = Vec::new();
        for program in &programs {
            let leaves = self.api.list_leaves(program.id).await?;
            tracing::trace!(program = %program.id, leaves = leaves.len(), "walked program");
            descriptors.extend(leaves.iter().map(|leaf| LeafDescriptor::new(program, leaf)));
        }

        tracing::debug!(
            programs = programs.len(),
            leaves = descriptors.len(),
            "catalog walk complete"
        );
        Ok(CatalogWalk {
            program_count: programs.len(),
            descriptors,
        })
    }
}

/// Walk the catalog and return only the descriptors
///
/// # Errors
/// See [`CatalogWalker::walk`]
pub async fn walk_catalog(api: &dyn CatalogApi) -> Result<Vec<LeafDescriptor>, PlannerError> {
    Ok(CatalogWalker::new(api).walk().await?.descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockCatalogApi;
    use crate::types::{Leaf, LeafId, Program, ProgramId};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn program(id: i64, name: &str) -> Program {
        Program {
            id: ProgramId(id),
            name: name.into(),
        }
    }

    fn leaf(id: i64, parent: i64) -> Leaf {
        Leaf {
            id: LeafId(id),
            name: format!("L{id}"),
            parent_program_id: ProgramId(parent),
        }
    }

    #[tokio::test]
    async fn empty_program_list_is_terminal() {
        let mut api = MockCatalogApi::new();
        api.expect_list_programs().times(1).returning(|| Ok(vec![]));
        api.expect_list_leaves().never();

        let walk = CatalogWalker::new(&api).walk().await.unwrap();
        assert!(walk.has_no_programs());
        assert!(walk.descriptors.is_empty());
    }

    #[tokio::test]
    async fn flattens_in_source_order_and_skips_empty_programs() {
        let mut api = MockCatalogApi::new();
        let mut seq = Sequence::new();
        api.expect_list_programs()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![program(2, "B"), program(1, "A"), program(3, "C")]));
        api.expect_list_leaves()
            .with(eq(ProgramId(2)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![leaf(21, 2), leaf(20, 2)]));
        api.expect_list_leaves()
            .with(eq(ProgramId(1)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        api.expect_list_leaves()
            .with(eq(ProgramId(3)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![leaf(30, 3)]));

        let walk = CatalogWalker::new(&api).walk().await.unwrap();
        let ids: Vec<i64> = walk.descriptors.iter().map(|d| d.leaf_id.0).collect();
        assert_eq!(ids, vec![21, 20, 30]);
        assert_eq!(walk.descriptors[0].program_name, "B");
        assert_eq!(walk.program_count, 3);
    }

    #[tokio::test]
    async fn leaf_list_failure_propagates() {
        let mut api = MockCatalogApi::new();
        api.expect_list_programs()
            .returning(|| Ok(vec![program(1, "A"), program(2, "B")]));
        api.expect_list_leaves()
            .with(eq(ProgramId(1)))
            .returning(|_| Err(PlannerError::http(500, "boom")));
        api.expect_list_leaves().with(eq(ProgramId(2))).never();

        let err = walk_catalog(&api).await.unwrap_err();
        assert_eq!(err, PlannerError::http(500, "boom"));
    }

    #[tokio::test]
    async fn root_failure_propagates() {
        let mut api = MockCatalogApi::new();
        api.expect_list_programs()
            .returning(|| Err(PlannerError::Transport("refused".into())));

        assert!(walk_catalog(&api).await.is_err());
    }
}
