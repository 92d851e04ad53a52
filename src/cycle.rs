use core::cell::RefCell;
use tracing::error;

use crate::{errors::ResolveErrorKind, key::Key};

struct Frame {
    injector: usize,
    key: Key,
}

thread_local! {
    /// Keys being constructed by the current thread, innermost last.
    /// Resolutions started from inside a constructor (including ones through a lazy handle) share it.
    static RESOLUTION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pops the frame pushed by [`begin_resolution`] on drop
#[must_use]
pub(crate) struct ResolutionGuard {
    _priv: (),
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Pushes the key onto the resolution stack of the injector.
///
/// Fails if the key is already being constructed by the injector on this thread,
/// or if the stack is already `max_depth` keys deep.
pub(crate) fn begin_resolution(injector: usize, key: &Key, max_depth: usize) -> Result<ResolutionGuard, ResolveErrorKind> {
    RESOLUTION_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();

        let frames = stack.iter().filter(|frame| frame.injector == injector);
        if let Some(start) = frames.clone().position(|frame| frame.key == *key) {
            let mut path: Vec<Key> = frames.skip(start).map(|frame| frame.key.clone()).collect();
            path.push(key.clone());

            let err = ResolveErrorKind::Circular { path };
            error!("{}", err);
            return Err(err);
        }

        if frames.count() >= max_depth {
            let err = ResolveErrorKind::DepthExceeded {
                key: key.clone(),
                max_depth,
            };
            error!("{}", err);
            return Err(err);
        }

        stack.push(Frame {
            injector,
            key: key.clone(),
        });
        Ok(ResolutionGuard { _priv: () })
    })
}

/// Key whose construction requested the next resolution of the injector, if any
pub(crate) fn requesting_key(injector: usize) -> Option<Key> {
    RESOLUTION_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|frame| frame.injector == injector)
            .map(|frame| frame.key.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::{begin_resolution, requesting_key};
    use crate::{errors::ResolveErrorKind, key::Key};

    use tracing_test::traced_test;

    struct A;
    struct B;

    #[test]
    #[traced_test]
    fn test_cycle_path() {
        let guard_a = begin_resolution(1, &Key::of::<A>(), 10).unwrap();
        let guard_b = begin_resolution(1, &Key::of::<B>(), 10).unwrap();

        let Err(ResolveErrorKind::Circular { path }) = begin_resolution(1, &Key::of::<A>(), 10) else {
            panic!("cycle isn't detected");
        };
        assert_eq!(path, [Key::of::<A>(), Key::of::<B>(), Key::of::<A>()]);

        // Same key of another injector isn't a cycle
        let guard_other = begin_resolution(2, &Key::of::<A>(), 10).unwrap();
        assert_eq!(requesting_key(1), Some(Key::of::<B>()));
        assert_eq!(requesting_key(2), Some(Key::of::<A>()));

        drop(guard_other);
        drop(guard_b);
        drop(guard_a);

        assert_eq!(requesting_key(1), None);
        drop(begin_resolution(1, &Key::of::<A>(), 10).unwrap());
    }

    #[test]
    #[traced_test]
    fn test_depth_limit() {
        let _guard_a = begin_resolution(1, &Key::of::<A>(), 1).unwrap();

        assert!(matches!(
            begin_resolution(1, &Key::of::<B>(), 1),
            Err(ResolveErrorKind::DepthExceeded { max_depth: 1, .. })
        ));
        assert!(begin_resolution(2, &Key::of::<B>(), 1).is_ok());
    }
}
