use std::future::Future;

/// What a single attempt produced
#[derive(Debug)]
pub enum Step<T> {
    /// Usable; stop here
    Accept(T),
    /// Not acceptable, but better than nothing if every later attempt fails
    Keep(T),
    Skip,
}

/// An attempt's outcome plus the log entries it produced
#[derive(Debug)]
pub struct Tried<T, E> {
    pub step: Step<T>,
    pub log: Vec<E>,
}

impl<T, E> Tried<T, E> {
    pub fn accept(value: T, log: Vec<E>) -> Self {
        Self { step: Step::Accept(value), log }
    }

    pub fn keep(value: T, log: Vec<E>) -> Self {
        Self { step: Step::Keep(value), log }
    }

    pub fn skip(log: Vec<E>) -> Self {
        Self { step: Step::Skip, log }
    }
}

/// How a cascade ended
#[derive(Debug, PartialEq, Eq)]
pub enum Settled<T> {
    Accepted(T),
    /// Nothing accepted; the most recent kept value
    Fallback(T),
    Exhausted,
}

impl<T> Settled<T> {
    pub fn accepted(self) -> Option<T> {
        match self {
            Settled::Accepted(v) => Some(v),
            _ => None,
        }
    }
}

/// Run `attempt` over `items` sequentially until one is accepted.
///
/// Regions, caption formats and header variants all cascade this way. Log entries are appended to `log` in attempt order, including those of the
/// accepted attempt.
pub async fn first_success<I, T, E, F, Fut>(log: &mut Vec<E>, items: I, mut attempt: F) -> Settled<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Tried<T, E>>,
{
    let mut kept = None;

    for item in items {
        let tried = attempt(item).await;
        log.extend(tried.log);
        match tried.step {
            Step::Accept(value) => return Settled::Accepted(value),
            Step::Keep(value) => kept = Some(value),
            Step::Skip => {}
        }
    }

    kept.map_or(Settled::Exhausted, Settled::Fallback)
}
