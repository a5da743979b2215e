/// A macro to create a [`Sequential`](crate::model::Sequential) container.
///
/// # Examples
///
/// ```
/// use nnmeter::layers::{Conv2d, Relu};
/// use nnmeter::sequential;
///
/// let block = sequential![
///     Conv2d::new(3, 8, (3, 3), (1, 1), (1, 1)),
///     Relu::new(),
/// ];
/// assert_eq!(block.len(), 2);
/// ```
///
/// Children are named by position, exactly like [`Sequential::add`](crate::model::Sequential::add).
#[macro_export]
macro_rules! sequential {
    ($($module:expr),* $(,)?) => {
        $crate::model::Sequential::new()$(.add($module))*
    };
}
