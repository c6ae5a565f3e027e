// im-pusher: Workspace root crate.
// Exists to host the cross-crate integration suites under tests/.
