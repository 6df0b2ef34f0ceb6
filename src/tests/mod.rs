mod bridge_scenarios;
mod session_refresh_tests;
