//! The seam to the external category rule engine.
//!
//! Rule matching lives outside this application; the import flow only needs a
//! hook that labels freshly accepted transactions before they are persisted.

use crate::{Error, database_id::UserId, transaction::TransactionBuilder};

/// Labels transactions with categories during import.
pub trait AssignCategories {
    /// Assign categories to the accepted transactions of one import batch.
    ///
    /// Implementations may leave transactions unlabelled.
    ///
    /// # Errors
    /// Returns an error if the rule engine fails; the import is rolled back.
    fn assign_for_import(
        &self,
        user_id: UserId,
        transactions: &mut [TransactionBuilder],
    ) -> Result<(), Error>;
}

/// An assigner that leaves every transaction uncategorised.
pub struct NoCategoryAssigner;

impl AssignCategories for NoCategoryAssigner {
    fn assign_for_import(
        &self,
        _user_id: UserId,
        _transactions: &mut [TransactionBuilder],
    ) -> Result<(), Error> {
        Ok(())
    }
}
