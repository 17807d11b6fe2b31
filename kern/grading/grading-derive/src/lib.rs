use proc_macro::TokenStream;
use quote::quote_spanned;
use syn::{ItemFn, LitByteStr, parse_macro_input, spanned::Spanned};

/// Feeds the given bytes to the console of the current thread and starts
/// capturing what is written to it.
#[proc_macro_attribute]
pub fn stdin(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(attr as LitByteStr);
    let mut input_fn = parse_macro_input!(item as ItemFn);
    let block = *input_fn.block;
    *input_fn.block = syn::parse_quote! {
        {
            grading::hook_stdin(#input);
            {
                #block
            }
        }
    };
    TokenStream::from(quote_spanned! { input_fn.span() =>
        #input_fn
    })
}

/// Asserts that the test wrote exactly the given bytes to the console.
///
/// The console must be hooked with `#[stdin]`, which goes below this
/// attribute.
#[proc_macro_attribute]
pub fn assert_output(attr: TokenStream, item: TokenStream) -> TokenStream {
    let output = parse_macro_input!(attr as LitByteStr);
    let mut input_fn = parse_macro_input!(item as ItemFn);
    let block = *input_fn.block;
    *input_fn.block = syn::parse_quote! {
        {
            let _return_val = (move || { #block })();
            if let Some(output) = grading::finish_hook() {
                assert_eq!(output.as_slice(), &#output[..]);
            } else {
                panic!("Output is not hooked.\nTo hook the output, stdin must be hooked.");
            }
            _return_val
        }
    };
    TokenStream::from(quote_spanned! { input_fn.span() =>
        #input_fn
    })
}
