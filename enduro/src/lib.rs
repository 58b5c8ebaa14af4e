pub mod core {
    pub mod car;
    pub mod driver;
    pub mod handle_race;
    pub mod lap_time;
    pub mod race;
    pub mod resources;
    pub mod standings;
    pub mod track;
}
pub mod decision;
pub mod errors;
pub mod interfaces {
    pub mod race_messages;
}
pub mod post {
    pub mod race_result;
}
pub mod pre {
    pub mod read_sim_pars;
    pub mod sim_opts;
}
