use super::*;
use axum::http::HeaderMap;

fn headers_with_cookie(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, value.parse().unwrap());
    headers
}

#[cfg(test)]
mod cookie_parsing_tests {
    use super::*;

    #[test]
    fn parses_multiple_pairs() {
        let jar = CookieJar::from_headers(&headers_with_cookie(
            "__clerk_db_jwt=abc; google_tokens=00ff:aa11;theme=dark",
        ));

        assert_eq!(jar.get("__clerk_db_jwt"), Some("abc"));
        assert_eq!(jar.get("google_tokens"), Some("00ff:aa11"));
        assert_eq!(jar.get("theme"), Some("dark"));
        assert_eq!(jar.get("missing"), None);
    }

    #[test]
    fn merges_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, "a=1".parse().unwrap());
        headers.append(header::COOKIE, "b=2".parse().unwrap());

        let jar = CookieJar::from_headers(&headers);
        assert_eq!(jar.get("a"), Some("1"));
        assert_eq!(jar.get("b"), Some("2"));
    }

    #[test]
    fn ignores_malformed_pairs() {
        let jar = CookieJar::from_headers(&headers_with_cookie("novalue; =orphan; ok=yes"));

        assert_eq!(jar.get("novalue"), None);
        assert_eq!(jar.get(""), None);
        assert_eq!(jar.get("ok"), Some("yes"));
    }

    #[test]
    fn strips_quotes() {
        let jar = CookieJar::from_headers(&headers_with_cookie("q=\"quoted\""));
        assert_eq!(jar.get("q"), Some("quoted"));
    }

    #[test]
    fn empty_headers() {
        let jar = CookieJar::from_headers(&HeaderMap::new());
        assert!(!jar.has_prefixed("__clerk"));
        assert!(jar.set_cookie_headers().is_empty());
    }
}

#[cfg(test)]
mod cookie_writing_tests {
    use super::*;

    #[test]
    fn set_is_visible_and_queued() {
        let mut jar = CookieJar::default();
        let options = CookieOptions {
            max_age: Some(60),
            ..CookieOptions::default()
        };

        jar.set("name", "value", &options).unwrap();

        assert_eq!(jar.get("name"), Some("value"));
        assert_eq!(
            jar.set_cookie_headers()[0],
            "name=value; Max-Age=60; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn remove_expires_cookie() {
        let mut jar = CookieJar::from_headers(&headers_with_cookie("name=value"));
        jar.remove("name", &CookieOptions::default());

        assert_eq!(jar.get("name"), None);
        assert_eq!(
            jar.set_cookie_headers()[0],
            "name=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn invalid_value_rejected() {
        let mut jar = CookieJar::default();
        assert!(jar.set("name", "bad\nvalue", &CookieOptions::default()).is_err());
        assert_eq!(jar.get("name"), None);
    }

    #[test]
    fn secure_attribute() {
        let mut jar = CookieJar::default();
        let options = CookieOptions {
            secure: true,
            ..CookieOptions::default()
        };
        jar.set("s", "1", &options).unwrap();

        assert!(jar.set_cookie_headers()[0].to_str().unwrap().contains("; Secure"));
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn session_cookie_present() {
        let jar = CookieJar::from_headers(&headers_with_cookie("__clerk_db_jwt=abc"));
        assert!(has_session(&jar, "__clerk"));
    }

    #[test]
    fn session_cookie_absent() {
        let jar = CookieJar::from_headers(&headers_with_cookie("google_tokens=00:11"));
        assert!(!has_session(&jar, "__clerk"));
    }

    #[test]
    fn empty_prefix_never_matches() {
        let jar = CookieJar::from_headers(&headers_with_cookie("anything=1"));
        assert!(!has_session(&jar, ""));
    }
}
