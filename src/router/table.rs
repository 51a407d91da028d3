use crate::{
    router::route::{Route, RouteMethod},
    Method,
};
use std::sync::Arc;

/// Method-indexed route stacks in registration order.
///
/// Middleware is copied into every stack and `GET` routes into the `HEAD`
/// stack, so a dispatch only ever scans the stack of its own method.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    stacks: [Vec<Arc<Route>>; Method::COUNT],
    registered: usize,
}

impl RouteTable {
    /// Position the next registration receives.
    #[inline(always)]
    pub(crate) const fn next_position(&self) -> usize {
        self.registered
    }

    pub(crate) fn push(&mut self, route: Arc<Route>) {
        match route.method() {
            RouteMethod::Use => {
                for stack in &mut self.stacks {
                    stack.push(Arc::clone(&route));
                }
            }
            RouteMethod::Verb(Method::Get) => {
                self.stacks[Method::Head.index()].push(Arc::clone(&route));
                self.stacks[Method::Get.index()].push(route);
            }
            RouteMethod::Verb(method) => self.stacks[method.index()].push(route),
        }
        self.registered += 1;
    }

    /// Routes a request with this method is tested against, in order.
    #[inline(always)]
    pub fn stack(&self, method: Method) -> &[Arc<Route>] {
        &self.stacks[method.index()]
    }

    /// Number of registrations.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.registered
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Every registration once, by position.
    ///
    /// `HEAD` copies of `GET` routes are skipped, and middleware entries that
    /// are the same registration or share a name collapse into the first.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        let mut all: Vec<Arc<Route>> = Method::ALL
            .iter()
            .flat_map(|&method| {
                self.stack(method).iter().filter(move |route| {
                    !(method == Method::Head && route.method() == RouteMethod::Verb(Method::Get))
                })
            })
            .cloned()
            .collect();

        all.sort_by_key(|route| route.position());

        let mut routes: Vec<Arc<Route>> = Vec::with_capacity(all.len());
        for route in all {
            let duplicate = route.method() == RouteMethod::Use
                && routes
                    .iter()
                    .any(|seen| seen.method() == RouteMethod::Use && seen.same_middleware(&route));

            if !duplicate {
                routes.push(route);
            }
        }
        routes
    }
}
