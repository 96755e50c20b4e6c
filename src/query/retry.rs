/// Run `op` up to `attempts` times (at least once), stopping at the first success.
///
/// `op` receives the zero-based attempt index. When every attempt fails the last
/// error is returned.
pub fn retry<T, E, F>(attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= attempts => return Err(err),
            Err(_) => attempt += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_first_success() {
        let mut calls = 0;
        let out: Result<&str, String> = retry(3, |_| {
            calls += 1;
            Ok("rows")
        });
        assert_eq!(out, Ok("rows"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn recovers_on_a_later_attempt() {
        let out: Result<u32, String> = retry(3, |attempt| {
            if attempt < 2 {
                Err(format!("fail {attempt}"))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(out, Ok(2));
    }

    #[test]
    fn keeps_the_last_error() {
        let mut seen = Vec::new();
        let out: Result<(), String> = retry(3, |attempt| {
            seen.push(attempt);
            Err(format!("fail {attempt}"))
        });
        assert_eq!(out, Err("fail 2".to_string()));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut calls = 0;
        let out: Result<(), &str> = retry(0, |_| {
            calls += 1;
            Err("down")
        });
        assert_eq!(out, Err("down"));
        assert_eq!(calls, 1);
    }
}
