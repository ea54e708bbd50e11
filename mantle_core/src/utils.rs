/*! Common utility functions
*/

use rand::Rng;

/// Generate a non-zero latency-probe token. A zero token could match an echo
/// nobody is waiting for.
pub fn gen_probe_token() -> u64 {
    let mut token = 0;
    while token == 0 {
        token = rand::thread_rng().gen();
    }
    token
}
