//! Lua scripts for atomic job transitions.
//!
//! Job hashes hold scalar fields only, so scripts update state with plain
//! `HSET`/`HDEL` and never decode JSON.

/// Insert a job hash and push its id onto the wait list.
///
/// KEYS[1] = job hash, KEYS[2] = wait list
/// ARGV[1] = job id, ARGV[2..] = field/value pairs
///
/// Returns 1 on insert, 0 if the job already exists.
pub const ENQUEUE: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 1 then
        return 0
    end
    redis.call('HSET', KEYS[1], unpack(ARGV, 2))
    redis.call('LPUSH', KEYS[2], ARGV[1])
    return 1
"#;

/// Promote due delayed jobs, then claim the oldest waiting job.
///
/// KEYS[1] = wait list, KEYS[2] = delayed zset, KEYS[3] = active zset
/// ARGV[1] = now (ms), ARGV[2] = lock token, ARGV[3] = lease expiry (ms),
/// ARGV[4] = job key prefix
///
/// Returns the claimed id, or nil when nothing is waiting.
pub const CLAIM: &str = r#"
    local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
    for _, id in ipairs(due) do
        redis.call('ZREM', KEYS[2], id)
        local key = ARGV[4] .. id
        if redis.call('EXISTS', key) == 1 then
            redis.call('HSET', key, 'state', 'waiting')
            redis.call('HDEL', key, 'delayed_until')
            redis.call('LPUSH', KEYS[1], id)
        end
    end

    while true do
        local id = redis.call('RPOP', KEYS[1])
        if not id then
            return nil
        end
        local key = ARGV[4] .. id
        if redis.call('HGET', key, 'state') == 'waiting' then
            redis.call('HINCRBY', key, 'attempts_made', 1)
            redis.call('HSET', key,
                'state', 'active',
                'progress', 0,
                'processed_at', ARGV[1],
                'lock_token', ARGV[2],
                'lock_expires_at', ARGV[3])
            redis.call('ZADD', KEYS[3], ARGV[3], id)
            return id
        end
    end
"#;

/// Complete an active job owned by the given token.
///
/// KEYS[1] = job hash, KEYS[2] = active zset, KEYS[3] = completed zset
/// ARGV[1] = lock token, ARGV[2] = now (ms), ARGV[3] = result JSON,
/// ARGV[4] = job id
///
/// Returns 1 on success, 0 if the token does not own the job.
pub const COMPLETE: &str = r#"
    if redis.call('HGET', KEYS[1], 'state') ~= 'active'
        or redis.call('HGET', KEYS[1], 'lock_token') ~= ARGV[1] then
        return 0
    end
    redis.call('ZREM', KEYS[2], ARGV[4])
    redis.call('HDEL', KEYS[1], 'lock_token', 'lock_expires_at', 'failed_reason')
    redis.call('HSET', KEYS[1],
        'state', 'completed',
        'progress', 100,
        'result', ARGV[3],
        'finished_at', ARGV[2])
    redis.call('ZADD', KEYS[3], ARGV[2], ARGV[4])
    return 1
"#;

/// Record a failed attempt of an active job owned by the given token.
///
/// KEYS[1] = job hash, KEYS[2] = active zset, KEYS[3] = delayed zset,
/// KEYS[4] = failed zset
/// ARGV[1] = lock token, ARGV[2] = now (ms), ARGV[3] = reason,
/// ARGV[4] = retry time (ms) or -1 for a terminal failure, ARGV[5] = job id
///
/// Returns the new state, or nil if the token does not own the job.
pub const FAIL: &str = r#"
    if redis.call('HGET', KEYS[1], 'state') ~= 'active'
        or redis.call('HGET', KEYS[1], 'lock_token') ~= ARGV[1] then
        return nil
    end
    redis.call('ZREM', KEYS[2], ARGV[5])
    redis.call('HDEL', KEYS[1], 'lock_token', 'lock_expires_at')

    if tonumber(ARGV[4]) >= 0 then
        redis.call('HSET', KEYS[1],
            'state', 'delayed',
            'failed_reason', ARGV[3],
            'delayed_until', ARGV[4])
        redis.call('ZADD', KEYS[3], ARGV[4], ARGV[5])
        return 'delayed'
    end

    redis.call('HSET', KEYS[1],
        'state', 'failed',
        'progress', 100,
        'failed_reason', ARGV[3],
        'finished_at', ARGV[2])
    redis.call('ZADD', KEYS[4], ARGV[2], ARGV[5])
    return 'failed'
"#;

/// Release active jobs whose lease expired.
///
/// KEYS[1] = active zset, KEYS[2] = wait list, KEYS[3] = failed zset
/// ARGV[1] = now (ms), ARGV[2] = job key prefix, ARGV[3] = stalled reason
///
/// Returns the recovered ids.
pub const RECOVER_STALLED: &str = r#"
    local expired = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
    local recovered = {}
    for _, id in ipairs(expired) do
        redis.call('ZREM', KEYS[1], id)
        local key = ARGV[2] .. id
        if redis.call('HGET', key, 'state') == 'active' then
            redis.call('HDEL', key, 'lock_token', 'lock_expires_at')
            local made = tonumber(redis.call('HGET', key, 'attempts_made') or '0')
            local max = tonumber(redis.call('HGET', key, 'max_attempts') or '1')
            if made < max then
                redis.call('HSET', key, 'state', 'waiting')
                redis.call('RPUSH', KEYS[2], id)
            else
                redis.call('HSET', key,
                    'state', 'failed',
                    'progress', 100,
                    'failed_reason', ARGV[3],
                    'finished_at', ARGV[1])
                redis.call('ZADD', KEYS[3], ARGV[1], id)
            end
            table.insert(recovered, id)
        end
    end
    return recovered
"#;

/// Delete terminal jobs finished before a cutoff, oldest first.
///
/// KEYS[1] = completed or failed zset
/// ARGV[1] = cutoff (ms), ARGV[2] = limit (0 = unlimited), ARGV[3] = job key prefix
///
/// Returns the removed ids.
pub const SWEEP: &str = r#"
    local ids
    if tonumber(ARGV[2]) > 0 then
        ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
    else
        ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
    end
    for _, id in ipairs(ids) do
        redis.call('ZREM', KEYS[1], id)
        redis.call('DEL', ARGV[3] .. id)
    end
    return ids
"#;
