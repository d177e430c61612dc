pub mod accounts;
pub mod attendance;
pub mod core;
pub mod dashboards;
pub mod session;
pub mod subjects;

pub fn is_known_method(method: &str) -> bool {
    [
        accounts::METHODS,
        attendance::METHODS,
        dashboards::METHODS,
        session::METHODS,
        subjects::METHODS,
    ]
    .iter()
    .any(|family| family.contains(&method))
}
