/// FFmpeg argument assertion utilities
#[allow(dead_code)]
pub fn assert_cmd_not_contains(cmd: &str, flag: &str) {
    assert!(
        !cmd.contains(flag),
        "Expected FFmpeg command to NOT contain '{}' but it did.\nCommand: {}",
        flag,
        cmd
    );
}

/// Check that `flag` is immediately followed by `value` in the argument list
#[allow(dead_code)]
pub fn assert_arg_pair(args: &[String], flag: &str, value: &str) {
    let found = args.windows(2).any(|w| w[0] == flag && w[1] == value);
    assert!(
        found,
        "Expected '{} {}' in FFmpeg arguments.\nArgs: {}",
        flag,
        value,
        args.join(" ")
    );
}

/// Value following the first occurrence of `flag`
#[allow(dead_code)]
pub fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
