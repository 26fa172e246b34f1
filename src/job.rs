use std::ops::Deref;

/// A unit of work submitted to a [`MicroBatcher`](crate::MicroBatcher).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Job<T> {
    data: T,
}

impl<T> Job<T> {
    #[inline]
    pub fn new(data: T) -> Self {
        Self { data }
    }

    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> From<T> for Job<T> {
    #[inline]
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T> Deref for Job<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}
