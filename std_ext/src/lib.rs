use std::sync::Arc;

use easy_ext::ext;

#[ext(ArcExt)]
pub impl<T: ?Sized> Arc<T> {
    #[must_use]
    fn clone_arc(&self) -> Self {
        Self::clone(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_arc_shares_the_allocation() {
        let original = Arc::new(5);
        let clone = original.clone_arc();

        assert!(Arc::ptr_eq(&original, &clone));
    }
}
