//! Parametric example nets.
//!
//! All generated nets are 1-safe; their reachable-set sizes are known in
//! closed form, which makes them convenient for tests and benchmarks.

use crate::error::NetError;
use crate::net::Net;

/// A single token circulating through `n` places.
///
/// Reachable markings: `n`. Never deadlocks.
pub fn token_ring(n: usize) -> Result<Net, NetError> {
    if n == 0 {
        return Err(NetError::Malformed("token ring needs at least one place".to_string()));
    }
    let mut builder = Net::builder();
    for i in 0..n {
        builder = builder.place(format!("p{}", i), u32::from(i == 0));
    }
    for i in 0..n {
        builder = builder.transition(format!("t{}", i), [format!("p{}", i)], [format!("p{}", (i + 1) % n)]);
    }
    builder.build()
}

/// `n` processes sharing one lock.
///
/// Process `i` moves `idle_i -> critical_i` by taking the lock and back by
/// releasing it. Reachable markings: `n + 1`. Never deadlocks.
pub fn mutex(n: usize) -> Result<Net, NetError> {
    if n == 0 {
        return Err(NetError::Malformed("mutex needs at least one process".to_string()));
    }
    let mut builder = Net::builder().place("lock", 1);
    for i in 0..n {
        builder = builder
            .weighted_place(format!("idle_{}", i), 1, 0)
            .weighted_place(format!("critical_{}", i), 0, (i + 1) as i64);
    }
    for i in 0..n {
        let idle = format!("idle_{}", i);
        let critical = format!("critical_{}", i);
        builder = builder
            .transition(format!("enter_{}", i), [idle.clone(), "lock".to_string()], [critical.clone()])
            .transition(format!("leave_{}", i), [critical], [idle, "lock".to_string()]);
    }
    builder.build()
}

/// Dining philosophers, each taking the left fork first.
///
/// Deadlocks once every philosopher holds a left fork.
pub fn dining_philosophers(n: usize) -> Result<Net, NetError> {
    if n < 2 {
        return Err(NetError::Malformed("dining philosophers needs at least two seats".to_string()));
    }
    let mut builder = Net::builder();
    for i in 0..n {
        builder = builder
            .place(format!("think_{}", i), 1)
            .place(format!("fork_{}", i), 1)
            .place(format!("left_{}", i), 0)
            .place(format!("eat_{}", i), 0);
    }
    for i in 0..n {
        let right = (i + 1) % n;
        builder = builder
            .transition(
                format!("take_left_{}", i),
                [format!("think_{}", i), format!("fork_{}", i)],
                [format!("left_{}", i)],
            )
            .transition(
                format!("take_right_{}", i),
                [format!("left_{}", i), format!("fork_{}", right)],
                [format!("eat_{}", i)],
            )
            .transition(
                format!("release_{}", i),
                [format!("eat_{}", i)],
                [format!("think_{}", i), format!("fork_{}", i), format!("fork_{}", right)],
            );
    }
    builder.build()
}
