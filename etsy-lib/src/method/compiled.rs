use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use http::Method;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use super::{ApiRequest, Arg, Args, MethodSpec, ParamType};
use crate::{ErrorKind, Result};

/// A positional placeholder runs from `:` up to the next `/` or the end.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([^/]+)").expect("placeholder regex is valid"));

/// Characters escaped when substituting a value into a path segment.
/// Commas stay literal so that lists read `a,b`.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed URI template such as `/shops/:shop_id/listings`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Split `uri` into literal text and `:name` placeholders
    #[must_use]
    pub fn parse(uri: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(uri) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(uri[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(name.as_str().to_string()));
            last = whole.end();
        }
        if last < uri.len() {
            segments.push(Segment::Literal(uri[last..].to_string()));
        }
        Self { segments }
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        let mut seen = BTreeSet::new();
        self.segments.iter().filter_map(move |segment| match segment {
            Segment::Placeholder(name) if seen.insert(name.as_str()) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Render the template, looking up each placeholder in `values`.
    ///
    /// A value filling a whole segment must not be `.` or `..`: URL parsing
    /// resolves dot segments (escaped or not) and the request would go to a
    /// different endpoint.
    fn render(&self, values: &BTreeMap<String, Arg>) -> Result<String> {
        let mut path = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Placeholder(name) => {
                    let Some(value) = values.get(name) else {
                        continue;
                    };
                    let encoded: String =
                        utf8_percent_encode(&value.to_string(), SEGMENT).collect();
                    let starts_segment = path.is_empty() || path.ends_with('/');
                    let ends_segment = match self.segments.get(i + 1) {
                        Some(Segment::Literal(next)) => next.starts_with('/'),
                        Some(Segment::Placeholder(_)) => false,
                        None => true,
                    };
                    if starts_segment && ends_segment && matches!(encoded.as_str(), "." | "..") {
                        return Err(ErrorKind::DotSegment(name.clone()));
                    }
                    path.push_str(&encoded);
                }
            }
        }
        Ok(path)
    }
}

/// A request builder compiled from one [`MethodSpec`].
///
/// Compilation splits the declared parameters into positional parameters
/// (the URI template placeholders) and keyword parameters (everything else).
/// The result is reusable: [`CompiledMethod::prepare`] validates and encodes
/// the arguments of one call without touching the network.
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    spec: Arc<MethodSpec>,
    template: UriTemplate,
    positionals: Vec<String>,
    keywords: BTreeSet<String>,
}

impl CompiledMethod {
    /// Compile a method specification
    #[must_use]
    pub fn compile(spec: Arc<MethodSpec>) -> Self {
        let template = UriTemplate::parse(&spec.uri);
        let positionals: Vec<String> = template.placeholders().map(String::from).collect();
        let keywords = spec
            .params
            .keys()
            .filter(|name| !positionals.contains(*name))
            .cloned()
            .collect();
        log::debug!(
            "Compiled method {} ({} {}), positionals: {:?}",
            spec.name,
            spec.http_method,
            spec.uri,
            positionals
        );
        Self {
            spec,
            template,
            positionals,
            keywords,
        }
    }

    /// Name of the method
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The method's description, verbatim from the method table
    #[must_use]
    pub fn description(&self) -> &str {
        &self.spec.description
    }

    /// The underlying specification
    #[must_use]
    pub fn spec(&self) -> &MethodSpec {
        &self.spec
    }

    /// Parameters substituted into the URI, in template order
    #[must_use]
    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    /// Parameters sent as query or form values
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    fn param_type(&self, name: &str) -> Option<&ParamType> {
        self.spec.params.get(name)
    }

    /// Validate `args` and build the request for one call.
    ///
    /// `default_api_key` is used unless the call overrides it with
    /// [`Args::api_key`].
    ///
    /// # Errors
    ///
    /// Fails with a validation error, before anything is sent, if
    /// - an argument names no declared parameter,
    /// - a positional parameter is missing,
    /// - a positional `array(...)` parameter is an empty sequence,
    /// - a positional value would form the path segment `.` or `..`,
    /// - a file is given to a method without request body.
    pub fn prepare(&self, args: Args, default_api_key: &SecretString) -> Result<ApiRequest> {
        let Args {
            mut values,
            fields,
            includes,
            api_key,
        } = args;

        if let Some(unknown) = values
            .keys()
            .find(|name| !self.spec.params.contains_key(*name) && !self.positionals.contains(*name))
        {
            return Err(ErrorKind::UnknownParameter {
                method: self.spec.name.clone(),
                param: unknown.clone(),
            });
        }

        for name in &self.positionals {
            let value = values
                .get(name)
                .ok_or_else(|| ErrorKind::MissingPositional(name.clone()))?;
            let is_array = self.param_type(name).is_some_and(ParamType::is_array);
            if is_array && value.is_empty_list() {
                return Err(ErrorKind::EmptyPositionalArray(name.clone()));
            }
        }

        let path = self.template.render(&values)?;
        values.retain(|name, _| self.keywords.contains(name));

        for name in &self.keywords {
            if values.contains_key(name) {
                continue;
            }
            if let Some(default) = self.spec.default_for(name).and_then(Arg::from_json) {
                values.insert(name.clone(), default);
            }
        }

        if self.spec.http_method == Method::GET {
            if let Some((name, _)) = values.iter().find(|(_, value)| value.is_file()) {
                return Err(ErrorKind::UnexpectedFile(
                    name.clone(),
                    self.spec.http_method.clone(),
                ));
            }
        }

        let api_key = api_key.as_ref().unwrap_or(default_api_key);
        values.insert(
            "api_key".to_string(),
            Arg::Str(api_key.expose_secret().to_string()),
        );
        if let Some(fields) = fields {
            values.insert("fields".to_string(), Arg::Str(fields.join(",")));
        }
        if let Some(includes) = includes {
            let rendered: Vec<String> = includes.iter().map(ToString::to_string).collect();
            values.insert("includes".to_string(), Arg::Str(rendered.join(",")));
        }

        Ok(ApiRequest {
            http_method: self.spec.http_method.clone(),
            path,
            params: values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Association, Bounds, FileArg};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn key() -> SecretString {
        SecretString::from("apikey")
    }

    fn test_method() -> CompiledMethod {
        let spec: MethodSpec = serde_json::from_value(crate::test_utils::test_method_spec()).unwrap();
        CompiledMethod::compile(Arc::new(spec))
    }

    #[test]
    fn test_template_placeholders() {
        let template = UriTemplate::parse("/shops/:shop_id/sections/:shop_section_id");
        let names: Vec<&str> = template.placeholders().collect();
        assert_eq!(names, vec!["shop_id", "shop_section_id"]);
    }

    #[test]
    fn test_template_prefix_collision() {
        let template = UriTemplate::parse("/users/:user/:user_id");
        let values = BTreeMap::from([
            ("user".to_string(), Arg::from("alice")),
            ("user_id".to_string(), Arg::from(42)),
        ]);
        assert_eq!(template.render(&values).unwrap(), "/users/alice/42");
    }

    #[test]
    fn test_template_without_placeholders() {
        let template = UriTemplate::parse("/listings/active");
        assert_eq!(template.placeholders().count(), 0);
        assert_eq!(template.render(&BTreeMap::new()).unwrap(), "/listings/active");
    }

    #[test]
    fn test_positional_and_keyword_split() {
        let method = test_method();
        assert_eq!(method.positionals(), ["ps_arr_str"]);
        let keywords: Vec<&str> = method.keywords().collect();
        assert_eq!(
            keywords,
            vec![
                "kw_array_int",
                "kw_enum",
                "kw_float",
                "kw_int",
                "kw_string",
                "kw_unknown"
            ]
        );
    }

    #[test]
    fn test_positional_argument_in_url() {
        let request = test_method()
            .prepare(Args::new().arg("ps_arr_str", vec!["a"]), &key())
            .unwrap();
        assert_eq!(request.path, "/test/a");
        assert_eq!(request.http_method, Method::GET);
    }

    #[test]
    fn test_positional_argument_array_commas_in_url() {
        let request = test_method()
            .prepare(Args::new().arg("ps_arr_str", vec!["a", "b"]), &key())
            .unwrap();
        assert_eq!(request.path, "/test/a,b");
    }

    #[rstest]
    #[case(vec![".."])]
    #[case(vec!["."])]
    fn test_dot_segment_rejected(#[case] value: Vec<&str>) {
        let err = test_method()
            .prepare(Args::new().arg("ps_arr_str", value), &key())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.parameter(), Some("ps_arr_str"));
    }

    #[test]
    fn test_dots_inside_segment_kept() {
        let base = url::Url::parse("https://openapi.etsy.com/v2").unwrap();
        for (value, expected) in [("...", "/v2/test/..."), ("a..", "/v2/test/a.."), ("..,..", "/v2/test/..,..")] {
            let request = test_method()
                .prepare(Args::new().arg("ps_arr_str", value), &key())
                .unwrap();
            let pending = request.into_pending(&base).unwrap();
            assert_eq!(pending.url.path(), expected);
        }
    }

    #[test]
    fn test_dot_placeholder_within_segment_allowed() {
        let template = UriTemplate::parse("/files/v:version");
        let values = BTreeMap::from([("version".to_string(), Arg::from(".."))]);
        assert_eq!(template.render(&values).unwrap(), "/files/v..");
    }

    #[test]
    fn test_positional_special_characters_escaped() {
        let request = test_method()
            .prepare(Args::new().arg("ps_arr_str", vec!["a/b", "c d"]), &key())
            .unwrap();
        assert_eq!(request.path, "/test/a%2Fb,c%20d");
    }

    #[test]
    fn test_invalid_empty_positional_argument_array() {
        let err = test_method()
            .prepare(Args::new().arg("ps_arr_str", Vec::<String>::new()), &key())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Positional argument 'ps_arr_str' must not be an empty array"
        );
    }

    #[test]
    fn test_missing_positional() {
        let err = test_method().prepare(Args::new(), &key()).unwrap_err();
        assert!(matches!(err, ErrorKind::MissingPositional(name) if name == "ps_arr_str"));
    }

    #[test]
    fn test_unknown_parameter() {
        let err = test_method()
            .prepare(
                Args::new().arg("ps_arr_str", vec!["a"]).arg("bogus", 1),
                &key(),
            )
            .unwrap_err();
        assert_eq!(err.parameter(), Some("bogus"));
    }

    #[test]
    fn test_keyword_argument_in_params() {
        let request = test_method()
            .prepare(
                Args::new().arg("ps_arr_str", vec!["a"]).arg("kw_int", 5),
                &key(),
            )
            .unwrap();
        assert_eq!(request.params.get("kw_int"), Some(&Arg::Int(5)));
        assert!(!request.params.contains_key("ps_arr_str"));
    }

    #[test]
    fn test_absent_keywords_are_omitted() {
        let request = test_method()
            .prepare(Args::new().arg("ps_arr_str", vec!["a"]), &key())
            .unwrap();
        let names: Vec<&String> = request.params.keys().collect();
        assert_eq!(names, vec!["api_key"]);
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let request = test_method()
            .prepare(
                Args::new()
                    .arg("ps_arr_str", vec!["a"])
                    .arg("kw_unknown", "opaque")
                    .arg("kw_array_int", vec![1, 2]),
                &key(),
            )
            .unwrap();
        assert_eq!(request.params["kw_unknown"], Arg::from("opaque"));
        assert_eq!(request.params["kw_array_int"].to_string(), "1,2");
    }

    #[test]
    fn test_reserved_options() {
        let request = test_method()
            .prepare(
                Args::new()
                    .arg("ps_arr_str", vec!["a"])
                    .fields(["title", "price"])
                    .include("Shop")
                    .include(Association::new("Images").bounds(Bounds::new(1)))
                    .api_key("override"),
                &key(),
            )
            .unwrap();
        assert_eq!(request.params["fields"], Arg::from("title,price"));
        assert_eq!(request.params["includes"], Arg::from("Shop,Images:1"));
        assert_eq!(request.params["api_key"], Arg::from("override"));
    }

    #[test]
    fn test_defaults_applied() {
        let spec: MethodSpec = serde_json::from_value(json!({
            "name": "findAllListingActive",
            "uri": "/listings/active",
            "http_method": "GET",
            "params": {"limit": "int", "offset": "int", "keywords": "string"},
            "defaults": {"limit": 25, "offset": 0, "keywords": null},
            "description": "Finds all active Listings."
        }))
        .unwrap();
        let method = CompiledMethod::compile(Arc::new(spec));
        let request = method.prepare(Args::new().arg("limit", 5), &key()).unwrap();
        assert_eq!(request.params["limit"], Arg::Int(5));
        assert_eq!(request.params["offset"], Arg::Int(0));
        assert!(!request.params.contains_key("keywords"));
    }

    #[test]
    fn test_file_rejected_for_get() {
        let err = test_method()
            .prepare(
                Args::new()
                    .arg("ps_arr_str", vec!["a"])
                    .arg("kw_string", FileArg::new("x.txt", b"x".to_vec())),
                &key(),
            )
            .unwrap_err();
        assert!(matches!(err, ErrorKind::UnexpectedFile(name, _) if name == "kw_string"));
    }

    #[test]
    fn test_description_verbatim() {
        assert_eq!(test_method().description(), "test method");
    }
}
